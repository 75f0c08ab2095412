pub mod repo;
pub mod repo_types;
pub mod validator;
pub mod writer;

pub use repo_types::IngredientEntry;
