mod logging;
mod string_utils;
mod time;

pub use logging::setup_logging;
pub use string_utils::{is_blank, new_id, non_blank, same_optional_name};
pub use time::{epoch_to_timestamp, get_epoch, get_timestamp};
