pub mod save_request;
