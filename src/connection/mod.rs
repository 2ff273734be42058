//! A single multiplexed connection to one Kafka broker.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, WriteHalf};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    frame::write_request_frame,
    messages::{
        ApiVersionsRequest, ApiVersionsResponse, FetchRequest, FetchResponse,
        FindCoordinatorRequest, FindCoordinatorResponse, ListOffsetsRequest, ListOffsetsResponse,
        MetadataRequest, MetadataResponse, OffsetCommitRequest, OffsetCommitResponse,
        OffsetFetchRequest, OffsetFetchResponse, ProduceRequest, ProduceResponse,
        ReadVersionedError, ReadVersionedType, RequestBody, RequestHeader, RequiredAcks,
        WriteVersionedError, WriteVersionedType,
    },
};

mod multiplex;
pub mod transport;

use multiplex::{Multiplexer, RegisterError};
pub use multiplex::TerminalError;
use transport::Transport;

/// Client ID presented to the broker in every request header.
const DEFAULT_CLIENT_ID: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Request headers are always written at version 1 (version 0 lacks the
/// client ID and was only ever used by one long-retired API).
const REQUEST_HEADER_VERSION: ApiVersion = ApiVersion(1);

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    /// The connection is dead; this and every following request fails with
    /// the same underlying error.
    #[error("Connection is dead: {0}")]
    Terminal(#[from] TerminalError),

    /// The correlation ID picked for this request is still in flight.
    ///
    /// This indicates a bug in the ID sequencing; the connection stays usable.
    #[error("Correlation ID {0} is already in flight")]
    CorrelationConflict(i32),

    /// The request could not be serialized at the selected version.
    #[error("Cannot serialize request: {0}")]
    WriteVersioned(#[from] WriteVersionedError),

    /// Writing the serialized request to the socket failed.
    ///
    /// Only this caller is affected; the read side decides whether the
    /// connection as a whole is gone.
    #[error("Cannot write request: {0}")]
    IO(#[from] std::io::Error),

    /// The response bytes did not parse.
    #[error("Cannot decode response: {0}")]
    ReadVersioned(#[from] ReadVersionedError),
}

impl From<RegisterError> for RequestError {
    fn from(error: RegisterError) -> Self {
        match error {
            RegisterError::Terminal(terminal) => Self::Terminal(terminal),
            RegisterError::Conflict(correlation_id) => Self::CorrelationConflict(correlation_id),
        }
    }
}

/// A connection to a single broker.
///
/// All request methods may be called concurrently; requests are pipelined on
/// the shared socket and responses are routed back by correlation ID, so
/// out-of-order broker replies never end up at the wrong caller.
///
/// The connection does not reconnect. Once any request returned
/// [`RequestError::Terminal`], the connection is gone for good and every
/// further call fails with the same error.
pub struct BrokerConnection<RW> {
    multiplexer: Arc<Multiplexer>,
    stream_write: tokio::sync::Mutex<WriteHalf<RW>>,
    client_id: Arc<str>,
    version_ranges: RwLock<HashMap<ApiKey, ApiVersionRange>>,
    reader_task: JoinHandle<()>,
}

impl BrokerConnection<Transport> {
    /// Connect to `broker` over plain TCP.
    ///
    /// `read_timeout` bounds each read of the background reader; `None`
    /// disables the deadline. There are no per-request timeouts.
    pub async fn connect_tcp(
        broker: &str,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
    ) -> Result<Self, transport::Error> {
        let transport = Transport::connect(broker, connect_timeout).await?;
        Ok(Self::new(transport, read_timeout))
    }

    /// Connect to `broker` over TLS.
    ///
    /// `ca_pem` is the sole trust root; `cert_pem` and `key_pem` are the
    /// client certificate and key presented to the broker.
    pub async fn connect_tls(
        broker: &str,
        ca_pem: &[u8],
        cert_pem: &[u8],
        key_pem: &[u8],
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
    ) -> Result<Self, transport::Error> {
        let tls_config = transport::tls_config(ca_pem, cert_pem, key_pem)?;
        let transport = Transport::connect_tls(broker, tls_config, connect_timeout).await?;
        Ok(Self::new(transport, read_timeout))
    }
}

impl<RW> BrokerConnection<RW>
where
    RW: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Run a connection over an established stream and spawn its reader task.
    pub fn new(stream: RW, read_timeout: Option<Duration>) -> Self {
        let (stream_read, stream_write) = tokio::io::split(stream);
        let multiplexer = Arc::new(Multiplexer::new());

        let reader_task = tokio::spawn(multiplex::run_reader(
            BufReader::new(stream_read),
            Arc::clone(&multiplexer),
            read_timeout,
        ));

        Self {
            multiplexer,
            stream_write: tokio::sync::Mutex::new(stream_write),
            client_id: Arc::from(DEFAULT_CLIENT_ID),
            version_ranges: RwLock::new(HashMap::new()),
            reader_task,
        }
    }

    /// Ask the broker which API versions it supports.
    ///
    /// Always sent as version 0, the only version every broker understands
    /// before negotiation. A successful response replaces the connection's
    /// version table, upgrading all subsequent version-negotiated requests.
    pub async fn api_versions(
        &self,
        request: ApiVersionsRequest,
    ) -> Result<ApiVersionsResponse, RequestError> {
        let response = self.request(&request, ApiVersion(0)).await?;

        if response.error_code.is_none() {
            self.store_version_ranges(&response);
        }

        Ok(response)
    }

    /// Fetch cluster metadata.
    pub async fn metadata(&self, request: MetadataRequest) -> Result<MetadataResponse, RequestError> {
        let version = self.best_version::<MetadataRequest>();
        self.request(&request, version).await
    }

    /// Produce messages.
    ///
    /// With [`RequiredAcks::None`] the broker never responds; the call returns
    /// `Ok(None)` as soon as the request is written, no waiter is registered
    /// and there is nothing to confirm delivery. Otherwise the broker's
    /// response is returned.
    pub async fn produce(
        &self,
        request: ProduceRequest,
    ) -> Result<Option<ProduceResponse>, RequestError> {
        let version = self.best_version::<ProduceRequest>();

        if request.required_acks == RequiredAcks::None {
            self.send_unacknowledged(&request, version).await?;
            return Ok(None);
        }

        Ok(Some(self.request(&request, version).await?))
    }

    /// Fetch messages.
    ///
    /// Brokers return compressed message sets in full even when the requested
    /// fetch offset points into their middle. Messages preceding the requested
    /// offset are cut off here, so callers never see offsets they did not ask
    /// for.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, RequestError> {
        let version = self.best_version::<FetchRequest>();
        let mut response = self.request(&request, version).await?;

        // response topics/partitions mirror the request positionally
        for (topic_request, topic) in request.topics.iter().zip(response.responses.iter_mut()) {
            for (partition_request, partition) in topic_request
                .partitions
                .iter()
                .zip(topic.partitions.iter_mut())
            {
                let records = &mut partition.records.0;
                let first_wanted = records
                    .iter()
                    .position(|record| record.offset >= partition_request.fetch_offset)
                    .unwrap_or(records.len());
                records.drain(..first_wanted);
            }
        }

        Ok(response)
    }

    /// List offsets by timestamp.
    ///
    /// The replica ID is forced to -1, the identifier of a non-node client;
    /// whatever the caller put there is ignored.
    pub async fn list_offsets(
        &self,
        mut request: ListOffsetsRequest,
    ) -> Result<ListOffsetsResponse, RequestError> {
        request.replica_id = -1;
        let version = self.best_version::<ListOffsetsRequest>();
        self.request(&request, version).await
    }

    /// Find the coordinator broker of a consumer group.
    pub async fn find_coordinator(
        &self,
        request: FindCoordinatorRequest,
    ) -> Result<FindCoordinatorResponse, RequestError> {
        self.request(&request, ApiVersion(0)).await
    }

    /// Commit consumed offsets for a consumer group.
    pub async fn offset_commit(
        &self,
        request: OffsetCommitRequest,
    ) -> Result<OffsetCommitResponse, RequestError> {
        self.request(&request, ApiVersion(0)).await
    }

    /// Read back committed offsets of a consumer group.
    pub async fn offset_fetch(
        &self,
        request: OffsetFetchRequest,
    ) -> Result<OffsetFetchResponse, RequestError> {
        self.request(&request, ApiVersion(0)).await
    }

    /// Tear the connection down.
    ///
    /// Every pending request is cancelled with [`TerminalError::Closed`] and
    /// every future request fails the same way. Calling this more than once is
    /// fine; only the first call has any observable effect on state.
    pub async fn close(&self) -> Result<(), std::io::Error> {
        self.multiplexer.drain(TerminalError::Closed);
        self.reader_task.abort();

        let mut stream_write = self.stream_write.lock().await;
        stream_write.shutdown().await
    }

    /// Dispatch `request` at `version` and decode the matching response.
    ///
    /// This is the shared skeleton under all request methods: issue a
    /// correlation ID, register a waiter, serialize, write, await the routed
    /// response payload, decode it. A failed write releases the waiter so no
    /// slot leaks; a cancelled waiter resolves to the connection's sticky
    /// error.
    async fn request<R>(
        &self,
        request: &R,
        version: ApiVersion,
    ) -> Result<R::ResponseBody, RequestError>
    where
        R: RequestBody + WriteVersionedType<Vec<u8>>,
        R::ResponseBody: ReadVersionedType<Cursor<Bytes>>,
    {
        let correlation_id = self.multiplexer.issue_id()?;
        let frame = self.serialize_request(request, version, correlation_id)?;

        let response = self.multiplexer.register(correlation_id)?;

        {
            let mut stream_write = self.stream_write.lock().await;
            if let Err(error) = write_request_frame(&mut *stream_write, &frame).await {
                self.multiplexer.release(correlation_id);
                return Err(error.into());
            }
        }

        let payload = match response.await {
            Ok(payload) => payload,
            Err(_) => return Err(self.multiplexer.terminal_error().into()),
        };

        let mut cursor = Cursor::new(payload);
        Ok(R::ResponseBody::read_versioned(&mut cursor, version)?)
    }

    /// Write `request` without registering any waiter.
    ///
    /// Used for fire-and-forget Produce, where the broker sends no response
    /// and a registered waiter could never be fulfilled.
    async fn send_unacknowledged<R>(
        &self,
        request: &R,
        version: ApiVersion,
    ) -> Result<(), RequestError>
    where
        R: RequestBody + WriteVersionedType<Vec<u8>>,
    {
        let correlation_id = self.multiplexer.issue_id()?;
        let frame = self.serialize_request(request, version, correlation_id)?;

        let mut stream_write = self.stream_write.lock().await;
        write_request_frame(&mut *stream_write, &frame).await?;
        Ok(())
    }

    fn serialize_request<R>(
        &self,
        request: &R,
        version: ApiVersion,
        correlation_id: i32,
    ) -> Result<Vec<u8>, RequestError>
    where
        R: RequestBody + WriteVersionedType<Vec<u8>>,
    {
        let header = RequestHeader {
            request_api_key: R::API_KEY,
            request_api_version: version,
            correlation_id,
            client_id: Some(self.client_id.to_string()),
        };

        let mut frame = Vec::new();
        header.write_versioned(&mut frame, REQUEST_HEADER_VERSION)?;
        request.write_versioned(&mut frame, version)?;
        Ok(frame)
    }

    /// The highest version of `R` both sides understand.
    ///
    /// Without a broker-advertised range (no successful ApiVersions call, or
    /// an API the broker did not list) this is version 0, the protocol's
    /// pre-negotiation default. A driver/broker range mismatch also falls back
    /// to 0 rather than failing, preserving bootstrap behavior.
    fn best_version<R>(&self) -> ApiVersion
    where
        R: RequestBody,
    {
        match self.version_ranges.read().get(&R::API_KEY) {
            None => ApiVersion(0),
            Some(broker) => R::API_VERSION_RANGE
                .best_match(*broker)
                .unwrap_or(ApiVersion(0)),
        }
    }

    fn store_version_ranges(&self, response: &ApiVersionsResponse) {
        let mut ranges = HashMap::with_capacity(response.api_keys.len());
        for api in &response.api_keys {
            if api.min_version.0 > api.max_version.0 {
                warn!(
                    api_key = ?api.api_key,
                    min = api.min_version.0,
                    max = api.max_version.0,
                    "broker advertised an inverted version range, ignoring",
                );
                continue;
            }
            ranges.insert(
                api.api_key,
                ApiVersionRange::new(api.min_version.0, api.max_version.0),
            );
        }

        debug!(apis = ranges.len(), "got supported versions from broker");
        *self.version_ranges.write() = ranges;
    }

    #[cfg(test)]
    fn pending_requests(&self) -> usize {
        self.multiplexer.waiter_count()
    }
}

impl<RW> Drop for BrokerConnection<RW> {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl<RW> std::fmt::Debug for BrokerConnection<RW> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
