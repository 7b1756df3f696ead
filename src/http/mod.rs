mod client;

pub use client::{
    content_disposition_filename, format_error_message, RequestClient, RequestError,
    RequestOptions, ResponseBody, INTERNAL_ERROR_MESSAGE, SERVICE_UNREACHABLE_MESSAGE,
};
