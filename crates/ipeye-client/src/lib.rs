use async_trait::async_trait;
use reqwest::{Client, Url, header};
use tracing::debug;

use crate::{
    config::ClientConfig,
    models::{Device, DeviceInfo},
};

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};

/// Remote source of camera records and their stream servers.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Fetches the complete camera listing.
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Looks up the stream info of a single camera.
    async fn device_info(&self, devcode: &str) -> Result<DeviceInfo>;

    /// Resolves the stream server hostname of a camera, rejecting empty answers.
    async fn resolve_server(&self, devcode: &str) -> Result<String> {
        let info = self.device_info(devcode).await?;

        if info.server.is_empty() {
            return Err(Error::EmptyServer {
                devcode: devcode.to_string(),
            });
        }

        Ok(info.server)
    }
}

pub struct IpeyeClient {
    client: Client,
    config: ClientConfig,
}

impl IpeyeClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(IpeyeClient { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn device_info_url(&self, devcode: &str) -> Result<Url> {
        let devcode: String = url::form_urlencoded::byte_serialize(devcode.as_bytes()).collect();
        let url = Url::parse(&self.config.device_info_url.replace("{devcode}", &devcode))?;
        Ok(url)
    }
}

#[async_trait]
impl DeviceDirectory for IpeyeClient {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        let url = Url::parse(&self.config.all_devices_url)?;

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "Device listing request failed: {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        let devices: Vec<Device> = serde_json::from_slice(&body)?;

        debug!(count = devices.len(), "Fetched device listing");
        Ok(devices)
    }

    async fn device_info(&self, devcode: &str) -> Result<DeviceInfo> {
        let url = self.device_info_url(devcode)?;

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "Stream info request failed: {} for device {}",
                response.status(),
                devcode
            )));
        }

        let body = response.bytes().await?;
        let info: DeviceInfo = serde_json::from_slice(&body)?;

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        net::SocketAddr,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use http_body_util::Full;
    use hyper::{
        Request, Response,
        body::{Bytes, Incoming},
        server::conn::http1,
        service::service_fn,
    };
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    use super::*;

    type Handler = Arc<dyn Fn(&str) -> (u16, String) + Send + Sync>;

    struct Stub {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<(String, String)>>>,
    }

    async fn spawn_stub(handler: Handler) -> Stub {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let seen = seen.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let handler = handler.clone();
                        let seen = seen.clone();
                        async move {
                            let target = req
                                .uri()
                                .path_and_query()
                                .map(|p| p.as_str().to_string())
                                .unwrap_or_default();
                            let agent = req
                                .headers()
                                .get(header::USER_AGENT)
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string();
                            seen.lock().unwrap().push((target.clone(), agent));

                            let (status, body) = handler(&target);
                            Ok::<_, Infallible>(
                                Response::builder()
                                    .status(status)
                                    .body(Full::new(Bytes::from(body)))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Stub { addr, requests }
    }

    fn client_for(addr: SocketAddr) -> IpeyeClient {
        IpeyeClient::new(ClientConfig {
            all_devices_url: format!("http://{addr}/index.php?route=proc_cam_cart"),
            device_info_url: format!("http://{addr}/webs/stream_info.php?devid={{devcode}}"),
            request_timeout: Duration::from_secs(5),
            user_agent: "ipeye-test-agent".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_devices_sends_identity_header() {
        let stub = spawn_stub(Arc::new(|_: &str| {
            (
                200,
                r#"[{"id_user":"1","devcode":"A","name":"Gate"}]"#.to_string(),
            )
        }))
        .await;

        let devices = client_for(stub.addr).list_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].devcode, "A");
        let requests = stub.requests.lock().unwrap();
        assert_eq!(requests[0].0, "/index.php?route=proc_cam_cart");
        assert_eq!(requests[0].1, "ipeye-test-agent");
    }

    #[tokio::test]
    async fn test_list_devices_rejects_non_array_body() {
        let stub = spawn_stub(Arc::new(|_: &str| {
            (200, "<html>maintenance</html>".to_string())
        }))
        .await;

        let err = client_for(stub.addr).list_devices().await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_device_info_substitutes_devcode() {
        let stub = spawn_stub(Arc::new(|target: &str| {
            if target.ends_with("devid=A%2B1") {
                (200, r#"{"server":"s1.ipeye.ru"}"#.to_string())
            } else {
                (404, String::new())
            }
        }))
        .await;

        let client = client_for(stub.addr);
        assert_eq!(client.resolve_server("A+1").await.unwrap(), "s1.ipeye.ru");
    }

    #[tokio::test]
    async fn test_resolve_server_rejects_empty_server() {
        let stub = spawn_stub(Arc::new(|_: &str| (200, r#"{"server":""}"#.to_string())))
            .await;

        let err = client_for(stub.addr).resolve_server("B").await.unwrap_err();
        assert!(matches!(err, Error::EmptyServer { ref devcode } if devcode == "B"));
    }

    #[tokio::test]
    async fn test_device_info_with_empty_body_is_decode_error() {
        let stub = spawn_stub(Arc::new(|_: &str| (200, String::new()))).await;

        let err = client_for(stub.addr).resolve_server("B").await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_device_info_surfaces_error_status() {
        let stub = spawn_stub(Arc::new(|_: &str| (502, String::new()))).await;

        let err = client_for(stub.addr).device_info("A").await.unwrap_err();
        assert!(matches!(err, Error::Api(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_request_timeout_is_enforced() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = IpeyeClient::new(ClientConfig {
            device_info_url: format!("http://{addr}/stream_info?devid={{devcode}}"),
            request_timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        })
        .unwrap();

        match client.device_info("A").await {
            Err(Error::Http(err)) => assert!(err.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
