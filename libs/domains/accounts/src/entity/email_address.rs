use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::EmailAddress;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "email_addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub verified: bool,
    pub primary: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for EmailAddress {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            email: model.email,
            verified: model.verified,
            primary: model.primary,
        }
    }
}

impl From<&EmailAddress> for ActiveModel {
    fn from(address: &EmailAddress) -> Self {
        ActiveModel {
            id: Set(address.id),
            user_id: Set(address.user_id),
            email: Set(address.email.clone()),
            verified: Set(address.verified),
            primary: Set(address.primary),
        }
    }
}
