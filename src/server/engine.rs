use super::service::MockService;
use may::coroutine::JoinHandle;
use may_minihttp::HttpServer;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

/// Handle to a running mock engine.
///
/// Returned by [`MockService::serve`]. Lets callers block until the
/// dispatch pipeline answers HTTP, stop the engine, or join on it.
pub struct MockEngineHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockService {
    /// Bind the engine on `addr` and start serving mocks under the
    /// `may` runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the port cannot be
    /// bound.
    pub fn serve<A: ToSocketAddrs>(self, addr: A) -> io::Result<MockEngineHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = HttpServer(self).start(addr)?;
        Ok(MockEngineHandle { addr, handle })
    }
}

impl MockEngineHandle {
    /// Block until the engine answers HTTP. An accepted TCP connection
    /// is not enough: the probe sends a real request and requires a
    /// status line back, so callers know the dispatch pipeline itself
    /// is up. Tests rely on this to avoid racing startup.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if self.probe().is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "mock engine not ready",
        ))
    }

    /// One readiness round-trip. The probe path lies outside `/rest/`,
    /// so a healthy engine answers with a bare 404; any HTTP status
    /// line counts as ready.
    fn probe(&self) -> io::Result<()> {
        let mut stream = TcpStream::connect(self.addr)?;
        stream.set_read_timeout(Some(Duration::from_millis(250)))?;
        stream.write_all(b"HEAD /__ready HTTP/1.1\r\nHost: probe\r\nConnection: close\r\n\r\n")?;
        let mut status = [0u8; 8];
        stream.read_exact(&mut status)?;
        if &status == b"HTTP/1.1" {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "readiness probe got a non-HTTP reply",
            ))
        }
    }

    /// Cancel the engine coroutine and wait for it to exit.
    pub fn stop(self) {
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the engine exits on its own.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}
