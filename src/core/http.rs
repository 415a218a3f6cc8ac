use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::redirect::Policy;
use reqwest::Client;

const APP_USER_AGENT: &str = "CrazyCityLauncher/0.1.0";

/// Client used for bundle downloads.
///
/// Redirects are not followed by reqwest; the downloader walks them itself so
/// the hop count and the final URL stay under our control.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .redirect(Policy::none())
        .build()
}

/// Client used for identity-provider calls (regular redirect handling).
pub fn build_api_client() -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(APP_USER_AGENT).build()
}
