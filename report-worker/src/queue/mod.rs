//! Queue module for the notification queue.
//!
//! This module provides:
//! - The job types carried on the queue
//! - The pull/ack consumer interface and its RabbitMQ implementation
//! - An async publisher for enqueueing jobs
//!
//! ## Flow
//!
//! ```text
//! Publisher → notifications queue → AmqpQueue → JobWorkerPool
//! ```

pub mod consumer;
pub mod publisher;
pub mod types;

pub use consumer::{AmqpQueue, Delivery, DeliveryAcker, JobQueue, QueueError};
pub use publisher::Publisher;
pub use types::{
    AttendanceEntry, AttendancePayload, EmailJob, GradeEntry, NotificationJob, ReportJob,
    ResultPayload, StudentInfo, NOTIFICATION_QUEUE,
};
