pub mod access;
pub mod collaboration;
pub mod repository;
pub mod team;
pub mod team_user;
pub mod user;

pub use access::Entity as Access;
pub use collaboration::Entity as Collaboration;
pub use repository::Entity as Repository;
pub use team::Entity as Team;
pub use team_user::Entity as TeamUser;
pub use user::Entity as User;
