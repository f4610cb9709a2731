pub mod postgres_audit;
