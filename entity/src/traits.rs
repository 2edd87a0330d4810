use sea_orm::{DatabaseConnection, DbErr};

/// Trait for entities that are always bound to a user and are looked up by
/// their own id plus that user's id in the same query, so a caller can never
/// accidentally fetch a row belonging to someone else.
pub trait QueryableByIdAndUserId {
    /// The model of the entity that is returned by the query
    type Model;

    fn find_by_id_and_user_id(
        id: &str,
        user_id: &str,
        db: &DatabaseConnection,
    ) -> impl std::future::Future<Output = Result<Option<Self::Model>, DbErr>> + Send;
}
