use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(schemas(axum_helpers::ErrorResponse)),
    info(
        title = "Accounts API",
        version = "0.1.0",
        description = "User records, registration and authentication"
    ),
    modifiers(&BearerAuth),
    nest(
        (path = "/user", api = domain_accounts::handlers::ApiDoc),
        (path = "/auth", api = domain_accounts::auth_handlers::AuthApiDoc)
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the protected auth paths.
struct BearerAuth;

impl utoipa::Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_nested_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in ["/user", "/user/{id}", "/auth/login", "/auth/registration"] {
            assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
        }
    }
}
