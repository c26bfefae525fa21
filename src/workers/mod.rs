pub mod dispatcher;

pub use dispatcher::DispatchWorker;
