use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use http_body_util::Full;
use hyper::{
    Request, Response,
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use ipeye_client::{
    DeviceDirectory, IpeyeClient,
    config::ClientConfig,
    error::{Error, Result},
    models::{Device, DeviceInfo},
};
use tokio::net::TcpListener;

/// Scripted answer of the stream info endpoint for one device code.
#[derive(Debug, Clone, Copy)]
pub enum Lookup {
    Server(&'static str),
    Empty,
    Error,
    /// Fails the first `n` lookups, then answers with the server.
    FailThen(usize, &'static str),
}

#[derive(Default)]
pub struct FakeDirectory {
    listing: Option<Vec<Device>>,
    lookups: HashMap<String, Lookup>,
    latency: Option<Duration>,
    info_calls: Mutex<HashMap<String, usize>>,
    list_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDirectory {
    pub fn with(mut self, devcode: &str, lookup: Lookup) -> Self {
        self.lookups.insert(devcode.to_string(), lookup);
        self
    }

    pub fn with_listing(mut self, devices: Vec<Device>) -> Self {
        self.listing = Some(devices);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn info_calls(&self, devcode: &str) -> usize {
        self.info_calls
            .lock()
            .unwrap()
            .get(devcode)
            .copied()
            .unwrap_or(0)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.info_calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl DeviceDirectory for FakeDirectory {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.listing
            .clone()
            .ok_or_else(|| Error::Api("listing unavailable".to_string()))
    }

    async fn device_info(&self, devcode: &str) -> Result<DeviceInfo> {
        let previous_calls = {
            let mut calls = self.info_calls.lock().unwrap();
            let count = calls.entry(devcode.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let server = |s: &str| DeviceInfo {
            server: s.to_string(),
        };
        match self.lookups.get(devcode) {
            Some(Lookup::Server(s)) => Ok(server(*s)),
            Some(Lookup::Empty) => Ok(DeviceInfo::default()),
            Some(Lookup::FailThen(n, s)) if previous_calls >= *n => Ok(server(*s)),
            Some(_) => Err(Error::Api(format!("lookup failed for {devcode}"))),
            None => Err(Error::Api(format!("unknown device {devcode}"))),
        }
    }
}

pub fn device(devcode: &str) -> Device {
    Device {
        id_user: "1".to_string(),
        devcode: devcode.to_string(),
        name: format!("Camera {devcode}"),
        stream_url: None,
    }
}

/// Canned IPEYE responses keyed by request target (path and query).
pub type Routes = HashMap<&'static str, (u16, &'static str)>;

/// Serves `routes` over loopback HTTP; unknown targets get a 404.
pub async fn spawn_ipeye_stub(routes: Routes) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let routes = routes.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let target = req
                        .uri()
                        .path_and_query()
                        .map(|p| p.as_str().to_string())
                        .unwrap_or_default();
                    let (status, body) = routes
                        .get(target.as_str())
                        .copied()
                        .unwrap_or((404, "not found"));
                    async move {
                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(status)
                                .body(Full::new(Bytes::from_static(body.as_bytes())))
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

    addr
}

pub fn stub_client(addr: SocketAddr) -> IpeyeClient {
    IpeyeClient::new(ClientConfig {
        all_devices_url: format!("http://{addr}/index.php?route=proc_cam_cart"),
        device_info_url: format!("http://{addr}/webs/stream_info.php?devid={{devcode}}"),
        request_timeout: Duration::from_secs(5),
        user_agent: "ipeye-test-agent".to_string(),
    })
    .unwrap()
}
