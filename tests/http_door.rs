use std::{
  net::SocketAddr,
  sync::{Arc, Mutex},
  time::Duration,
};

use http_garage::{
  door::{Door, DoorConfig, DoorRemote, DoorState, HttpRemote},
  error::GarageError,
};
use tokio::{
  io::{AsyncReadExt, AsyncWriteExt},
  net::{TcpListener, TcpStream},
  time,
};

/// A pretend door controller: serves its status page and flips open/closed on each toggle.
#[derive(Debug, Default)]
struct Device {
  status_page: Mutex<String>,
  requests: Mutex<Vec<String>>,
}

impl Device {
  async fn serve(status_page: &str) -> (Arc<Device>, SocketAddr) {
    let device = Arc::new(Device {
      status_page: Mutex::new(status_page.to_string()),
      ..Device::default()
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Arc::clone(&device);
    tokio::spawn(async move {
      loop {
        let (stream, _) = listener.accept().await.unwrap();
        let device = Arc::clone(&server);
        tokio::spawn(async move { device.respond(stream).await });
      }
    });

    (device, addr)
  }

  async fn respond(&self, mut stream: TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0; 1024];
    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
      match stream.read(&mut buf).await {
        Ok(0) | Err(_) => return,
        Ok(read) => request.extend_from_slice(&buf[..read]),
      }
    }
    let request = String::from_utf8_lossy(&request).to_string();
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
    self.requests.lock().unwrap().push(request);

    let (status, body) = match path.as_str() {
      "/?switch=1" => {
        let mut page = self.status_page.lock().unwrap();
        *page = if page.contains("CLOSED") {
          "Door Status: OPEN".to_string()
        }
        else {
          "Door Status: CLOSED".to_string()
        };
        ("200 OK", b"switched".to_vec())
      }
      "/broken" => ("500 Internal Server Error", b"oops".to_vec()),
      "/garbled" => ("200 OK", [&b"Door Status: OPEN "[..], &[0xff_u8, 0xfe, 0xc3][..]].concat()),
      _ => (
        "200 OK",
        format!("<html><body>{}</body></html>", self.status_page.lock().unwrap()).into_bytes(),
      ),
    };

    let mut response = format!(
      "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
      body.len()
    )
    .into_bytes();
    response.extend_from_slice(&body);
    let _ = stream.write_all(&response).await;
    let _ = stream.shutdown().await;
  }

  fn requests(&self) -> Vec<String> {
    self.requests.lock().unwrap().clone()
  }
}

fn config(addr: SocketAddr) -> DoorConfig {
  DoorConfig {
    poll_interval: Duration::from_secs(1),
    ..DoorConfig::new(format!("http://{addr}"))
  }
}

#[tokio::test]
async fn fetches_status_page_with_basic_auth() {
  let (device, addr) = Device::serve("Door Status: Closed").await;
  let config = DoorConfig {
    username: Some("user".to_string()),
    password: Some(http_garage::door::config::Password("pass".to_string())),
    ..config(addr)
  };
  let remote = HttpRemote::new(&config).unwrap();

  let page = remote.fetch_status().await.unwrap();
  assert!(page.contains("Door Status: Closed"));

  let requests = device.requests();
  assert_eq!(requests.len(), 1);
  let request = requests[0].to_lowercase();
  assert!(request.starts_with("get / "));
  // base64 of user:pass
  assert!(request.contains("authorization: basic dxnlcjpwyxnz"));
}

#[tokio::test]
async fn no_auth_header_without_credentials() {
  let (device, addr) = Device::serve("Door Status: OPEN").await;
  let remote = HttpRemote::new(&config(addr)).unwrap();

  remote.send_toggle().await.unwrap();
  let request = device.requests()[0].to_lowercase();
  assert!(request.starts_with("get /?switch=1 "));
  assert!(!request.contains("authorization:"));
}

#[tokio::test]
async fn error_status_is_a_network_failure() {
  let (_device, addr) = Device::serve("Door Status: OPEN").await;
  let config = DoorConfig {
    toggle_path: "/broken".to_string(),
    ..config(addr)
  };
  let remote = HttpRemote::new(&config).unwrap();

  let err = remote.send_toggle().await.unwrap_err();
  assert!(matches!(err, GarageError::Network { ref url, .. } if url.ends_with("/broken")));
}

#[tokio::test]
async fn undecodable_status_page_is_a_network_failure() {
  let (_device, addr) = Device::serve("Door Status: OPEN").await;
  let config = DoorConfig {
    status_path: "/garbled".to_string(),
    ..config(addr)
  };
  let remote = HttpRemote::new(&config).unwrap();

  let err = remote.fetch_status().await.unwrap_err();
  assert!(matches!(err, GarageError::Network { ref reason, .. } if reason.contains("UTF-8")));
}

#[tokio::test]
async fn unreachable_device_is_a_network_failure() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);

  let remote = HttpRemote::new(&config(addr)).unwrap();
  assert!(matches!(remote.fetch_status().await, Err(GarageError::Network { .. })));
}

#[tokio::test]
async fn setup_fails_when_status_is_unreadable() {
  let (_device, addr) = Device::serve("firmware update in progress").await;

  let err = Door::initialize("garage".into(), config(addr)).await.unwrap_err();
  assert!(matches!(err, GarageError::Setup { .. }));
}

#[tokio::test]
async fn open_a_closed_door() {
  let (device, addr) = Device::serve("Door Status: CLOSED").await;
  let door = Door::initialize("garage".into(), config(addr)).await.unwrap();
  assert_eq!(door.state().is_closed, Some(true));

  let mut states = door.subscribe();
  door.open().await.unwrap();
  assert_eq!(door.snapshot().last_value, Some(DoorState::Open));
  assert!(door.state().is_opening);

  time::timeout(
    Duration::from_secs(5),
    states.wait_for(|state| state.is_closed == Some(false) && !state.is_opening),
  )
  .await
  .expect("door never settled")
  .unwrap();

  let toggles = device
    .requests()
    .iter()
    .filter(|request| request.starts_with("GET /?switch=1 "))
    .count();
  assert_eq!(toggles, 1);
}
