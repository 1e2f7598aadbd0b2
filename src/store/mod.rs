pub mod batch_cache;
