pub mod builders;
pub mod db;

pub use builders::{user, OrgBuilder, TestOrg};
pub use db::TestDb;
