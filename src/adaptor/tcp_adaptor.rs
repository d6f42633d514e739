use std::{io::ErrorKind, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Deserializer, error::Category};
use tokio::{net::{TcpListener, TcpStream}, task::JoinHandle, io::{AsyncWriteExt, AsyncReadExt}, time::timeout};
use tracing::{debug, info, warn};

use super::ChordAdaptor;
use crate::{
	chord::{ChordNode, message::{Request, Response}},
	error::{Error, Result},
};

/// An implementation of ChordAdaptor that opens one TCP connection per call
/// and exchanges JSON documents over it.
#[derive(Debug, Clone)]
pub struct TCPAdaptor {
	timeout: Duration,
}

impl TCPAdaptor {
	pub fn new(timeout: Duration) -> Self {
		TCPAdaptor { timeout }
	}

	/// Serves requests arriving on `listener` until the task is aborted.
	/// Each connection may carry any number of requests, answered in order.
	pub fn listen_handler<A: ChordAdaptor>(listener: TcpListener, node: Arc<ChordNode<A>>) -> JoinHandle<()> {
		tokio::spawn(async move {
			loop {
				match listener.accept().await {
					Err(e) => {
						warn!("Encountered an error in accept: {}", e);
					},
					Ok((stream, peer)) => {
						debug!("accepted connection from {}", peer);
						let node = node.clone();
						tokio::spawn(async move {
							Self::serve(TcpChordStream::new(stream), node).await;
						});
					},
				}
			}
		})
	}

	async fn serve<A: ChordAdaptor>(mut stream: TcpChordStream, node: Arc<ChordNode<A>>) {
		loop {
			let request = match stream.read::<Request>().await {
				Ok(request) => request,
				Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
				Err(e) => {
					warn!("dropping connection: {}", e);
					let _ = stream.write(&Response::Error(e.to_string())).await;
					break;
				},
			};
			let response = node.process(request).await;
			if let Err(e) = stream.write(&response).await {
				warn!("failed to answer: {}", e);
				break;
			}
		}
	}
}

#[async_trait]
impl ChordAdaptor for TCPAdaptor {
	async fn call(&self, addr: &str, request: Request) -> Result<Response> {
		let exchange = async {
			let stream = TcpStream::connect(addr).await?;
			let mut stream = TcpChordStream::new(stream);
			stream.write(&request).await?;
			let response: Response = stream.read().await?;
			Ok::<_, Error>(response)
		};

		match timeout(self.timeout, exchange).await {
			Ok(Ok(response)) => Ok(response),
			Ok(Err(Error::Io(e))) => {
				info!("call to {} failed: {}", addr, e);
				Err(Error::unreachable(addr, e))
			},
			Ok(Err(e)) => Err(e),
			Err(_) => {
				info!("call to {} timed out", addr);
				Err(Error::unreachable(addr, format!("no answer within {:?}", self.timeout)))
			},
		}
	}
}


/// A TCP stream carrying concatenated JSON documents.
struct TcpChordStream {
	stream: TcpStream,
	buffer: Vec<u8>,
}

impl TcpChordStream {
	fn new(stream: TcpStream) -> Self {
		Self {
			stream,
			buffer: Vec::new(),
		}
	}

	async fn read<T: DeserializeOwned>(&mut self) -> Result<T> {
		loop {
			// attempt to deserialize buffer
			let parsed = {
				let mut messages = Deserializer::from_slice(self.buffer.as_slice()).into_iter::<T>();
				match messages.next() {
					Some(Ok(msg)) => Some(Ok((msg, messages.byte_offset()))),
					// if we have encountered an EOF, more information may arrive later
					Some(Err(ref e)) if e.classify() == Category::Eof => None,
					Some(Err(e)) => Some(Err(e)),
					None => None,
				}
			};

			match parsed {
				Some(Ok((msg, offset))) => {
					self.buffer.drain(..offset);
					return Ok(msg);
				},
				Some(Err(e)) => return Err(e.into()),
				None => {},
			}

			// else, read bytes into buffer
			let mut tmp_buf = [0u8; 1024];
			let len = self.stream.read(&mut tmp_buf).await?;
			if len == 0 {
				return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into());
			}
			self.buffer.extend_from_slice(&tmp_buf[..len]);
		}
	}

	async fn write<T: Serialize>(&mut self, msg: &T) -> Result<()> {
		let mut raw_data = serde_json::to_vec(msg)?;
		raw_data.push(b'\n');
		self.stream.write_all(&raw_data).await?;
		self.stream.flush().await?;
		Ok(())
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::chord_id::ChordId;

	#[tokio::test]
	async fn stream_reassembles_split_documents() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		let writer = tokio::spawn(async move {
			let (mut socket, _) = listener.accept().await.unwrap();
			let raw = serde_json::to_vec(&Request::Get { key: ChordId(9) }).unwrap();
			let (head, tail) = raw.split_at(5);
			socket.write_all(head).await.unwrap();
			socket.flush().await.unwrap();
			tokio::time::sleep(Duration::from_millis(20)).await;
			socket.write_all(tail).await.unwrap();
			socket.write_all(b"\"Ping\"").await.unwrap();
		});

		let mut stream = TcpChordStream::new(TcpStream::connect(addr).await.unwrap());
		match stream.read::<Request>().await.unwrap() {
			Request::Get { key } => assert_eq!(key, ChordId(9)),
			other => panic!("unexpected {:?}", other),
		}
		assert!(matches!(stream.read::<Request>().await.unwrap(), Request::Ping));
		writer.await.unwrap();
		assert!(matches!(stream.read::<Request>().await, Err(Error::Io(_))));
	}

	#[tokio::test]
	async fn refused_connection_is_unreachable() {
		// bind then drop to get a port nobody listens on
		let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
		let adaptor = TCPAdaptor::new(Duration::from_millis(500));
		let err = adaptor.call(&addr.to_string(), Request::Ping).await.unwrap_err();
		assert!(err.is_unreachable(), "{:?}", err);
	}

	#[tokio::test]
	async fn silent_peer_times_out() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let _hold = tokio::spawn(async move {
			let (_socket, _) = listener.accept().await.unwrap();
			tokio::time::sleep(Duration::from_secs(5)).await;
		});
		let adaptor = TCPAdaptor::new(Duration::from_millis(100));
		let err = adaptor.call(&addr.to_string(), Request::Ping).await.unwrap_err();
		assert!(err.is_unreachable(), "{:?}", err);
	}
}
