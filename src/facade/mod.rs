pub mod router;

pub use router::MetaRouter;
