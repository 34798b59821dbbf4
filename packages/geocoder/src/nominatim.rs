//! Nominatim / OpenStreetMap reverse geocoder client.
//!
//! The public instance allows at most **1 request per second** and
//! requires a `User-Agent` identifying the application. Pacing is the
//! caller's job; see `rate_limit_ms` in the service TOML configuration.
//!
//! See <https://nominatim.org/release-docs/develop/api/Reverse/>

use async_trait::async_trait;
use serde::Deserialize;

use crate::service_registry::ReverseService;
use crate::{GeocodeError, ReverseAddress, ReverseGeocoder};

/// Reverse geocoding client for a Nominatim `/reverse` endpoint.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    zoom: u8,
}

impl NominatimClient {
    /// Builds an HTTP client carrying the service's `User-Agent` and
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be
    /// constructed (e.g. no TLS backend available).
    pub fn new(service: &ReverseService) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(service.user_agent.clone())
            .timeout(service.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: service.base_url.clone(),
            zoom: service.zoom,
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<Option<ReverseAddress>, GeocodeError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("zoom", self.zoom.to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            log::warn!("Rate limited by Nominatim at ({lat}, {lon})");
            return Ok(None);
        }
        if status != reqwest::StatusCode::OK {
            log::debug!("Nominatim returned {status} for ({lat}, {lon})");
            return Ok(None);
        }

        let body = resp.text().await?;
        Ok(parse_response(&body))
    }
}

/// Raw shape of a `/reverse?format=json` response.
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<AddressDetails>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AddressDetails {
    #[serde(default)]
    road: Option<String>,
    #[serde(default)]
    neighbourhood: Option<String>,
    #[serde(default)]
    suburb: Option<String>,
    #[serde(default)]
    house_number: Option<String>,
}

/// Parses a Nominatim reverse response body.
///
/// Returns `None` if the body is not a JSON object of the expected
/// shape. Nominatim's `{"error": "Unable to geocode"}` parses to an
/// address with every field empty.
fn parse_response(body: &str) -> Option<ReverseAddress> {
    let parsed: ReverseResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("Undecodable Nominatim response: {e}");
            return None;
        }
    };

    let details = parsed.address.unwrap_or_default();

    Some(ReverseAddress {
        road: details.road,
        neighbourhood: details.neighbourhood,
        suburb: details.suburb,
        house_number: details.house_number,
        display_name: parsed.display_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    #[test]
    fn parses_reverse_result() {
        let body = r#"{
            "place_id": 1,
            "display_name": "23, Calle 5, El Poblado, Medellín, Colombia",
            "address": {
                "house_number": "23",
                "road": "Calle 5",
                "neighbourhood": "El Poblado",
                "city": "Medellín",
                "country_code": "co"
            }
        }"#;

        let result = parse_response(body).unwrap();
        assert_eq!(result.road.as_deref(), Some("Calle 5"));
        assert_eq!(result.house_number.as_deref(), Some("23"));
        assert_eq!(result.neighbourhood.as_deref(), Some("El Poblado"));
        assert_eq!(result.suburb, None);
        assert_eq!(
            result.display_name.as_deref(),
            Some("23, Calle 5, El Poblado, Medellín, Colombia")
        );
    }

    #[test]
    fn parses_unable_to_geocode() {
        let result = parse_response(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert_eq!(result, ReverseAddress::default());
    }

    #[test]
    fn malformed_body_is_empty() {
        assert!(parse_response("<html>502 Bad Gateway</html>").is_none());
        assert!(parse_response("42").is_none());
    }

    /// Serves exactly one canned HTTP response and returns the request
    /// line and headers the client sent.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/reverse", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    fn service(base_url: String) -> ReverseService {
        ReverseService {
            id: "test".to_string(),
            name: "Test".to_string(),
            base_url,
            user_agent: "osm_address_tests".to_string(),
            zoom: 18,
            rate_limit_ms: 0,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn sends_reverse_query_with_user_agent() {
        let (url, handle) = serve_once(
            "200 OK",
            r#"{"address":{"road":"Carrera 10"},"display_name":"Carrera 10, Bogotá"}"#,
        )
        .await;

        let client = NominatimClient::new(&service(url)).unwrap();
        let result = client.reverse(4.6097, -74.0817).await.unwrap().unwrap();
        assert_eq!(result.road.as_deref(), Some("Carrera 10"));

        let request = handle.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /reverse?"), "{request_line}");
        assert!(request_line.contains("format=json"));
        assert!(request_line.contains("lat=4.6097"));
        assert!(request_line.contains("lon=-74.0817"));
        assert!(request_line.contains("zoom=18"));
        assert!(request_line.contains("addressdetails=1"));
        assert!(
            request
                .to_ascii_lowercase()
                .contains("user-agent: osm_address_tests")
        );
    }

    #[tokio::test]
    async fn non_200_is_empty_result() {
        let (url, handle) = serve_once("503 Service Unavailable", "").await;

        let client = NominatimClient::new(&service(url)).unwrap();
        assert!(client.reverse(6.25, -75.56).await.unwrap().is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn rate_limited_is_empty_result() {
        let (url, handle) = serve_once("429 Too Many Requests", "{}").await;

        let client = NominatimClient::new(&service(url)).unwrap();
        assert!(client.reverse(6.25, -75.56).await.unwrap().is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_json_is_empty_result() {
        let (url, handle) = serve_once("200 OK", "not json").await;

        let client = NominatimClient::new(&service(url)).unwrap();
        assert!(client.reverse(6.25, -75.56).await.unwrap().is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn connection_refused_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/reverse", listener.local_addr().unwrap());
        drop(listener);

        let client = NominatimClient::new(&service(url)).unwrap();
        assert!(matches!(
            client.reverse(6.25, -75.56).await,
            Err(GeocodeError::Http(_))
        ));
    }
}
