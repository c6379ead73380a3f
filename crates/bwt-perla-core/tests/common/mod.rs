//! Common test utilities: a fake Perla device served by axum.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use bwt_perla_core::DeviceEndpoints;

/// Counts requests per endpoint of the fake device.
#[derive(Debug, Default)]
pub struct Hits {
    pub registers: AtomicUsize,
    pub silk: AtomicUsize,
    pub local_api: AtomicUsize,
}

impl Hits {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn registers(&self) -> usize {
        self.registers.load(Ordering::SeqCst)
    }

    pub fn silk(&self) -> usize {
        self.silk.load(Ordering::SeqCst)
    }

    pub fn local_api(&self) -> usize {
        self.local_api.load(Ordering::SeqCst)
    }
}

/// Serve `router` on an ephemeral localhost port.
pub async fn spawn_device(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Every endpoint on the same fake server.
pub fn endpoints(addr: SocketAddr) -> DeviceEndpoints {
    DeviceEndpoints {
        registers: format!("http://{}/silk/registers", addr),
        silk: format!("http://{}/registers", addr),
        local_api: format!("http://{}/api/GetCurrentData", addr),
    }
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A 48 slot register array with the given slots set.
pub fn registers(slots: &[(usize, i64)]) -> Vec<i64> {
    let mut values = vec![0; 48];
    for (index, value) in slots {
        values[*index] = *value;
    }
    values
}
