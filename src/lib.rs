pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod ai {
    pub mod client;
    pub mod parse;
}
pub mod api {
    pub mod ai;
    pub mod auth;
    pub mod documents;
    pub mod errors;
    pub mod ingest;
    pub mod users;
}
pub mod db {
    pub mod models;
    pub mod repository;
    pub mod user_repository;
}
pub mod storage {
    pub mod client;
}

#[cfg(test)]
mod test_support;
