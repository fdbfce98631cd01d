#[macro_export]
/// Creates a mock web server, which responds with a predefined status
/// when handling a matching GET request
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::builder().start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// A client with default settings
///
/// # Panic
///
/// This panics on error, so it should only be used for testing
pub(crate) fn mock_client() -> crate::Client {
    crate::ClientBuilder::builder()
        .build()
        .client()
        .expect("client with default settings")
}
