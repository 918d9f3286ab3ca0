pub mod cplap;
pub mod grid;
pub mod ingest;
pub mod limits;
