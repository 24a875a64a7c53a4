pub mod router;
pub mod types;
pub mod handlers {
    pub mod authors;
    pub mod books;
    pub mod common;
    pub mod health;
    pub mod stats;
}

pub use router::{create_router, ApiDoc};
pub use types::AppState;
