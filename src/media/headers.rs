//! Static request headers shared by every backend request path.

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

pub const Y2MATE_ORIGIN: &str = "https://www.y2mate.com";

pub const YT5S_ORIGIN: &str = "https://yt5s.com";
pub const YT5S_REFERER: &str = "https://yt5s.com/";
/// Client name sent in form bodies and push subscriptions.
pub const YT5S_CLIENT: &str = "yt5s.com";
