pub mod department_cache;
pub mod sql;
