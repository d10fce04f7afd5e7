pub mod client;
pub mod config;
pub mod job;
pub mod mock;
pub mod param;
pub mod rest;
pub mod result;
pub mod runner;

pub use client::{Warehouse, WarehouseError};
pub use config::WarehouseConfig;
pub use job::{JobError, JobHandle, JobState, JobStatus, ResultHandle};
pub use mock::MockWarehouse;
pub use param::{validate_bindings, ParameterMode, QueryParameter, ScalarType};
pub use rest::RestWarehouse;
pub use result::{ResultPage, Row, Value};
pub use runner::{ExecutionMode, QueryRows, QueryRunner};
