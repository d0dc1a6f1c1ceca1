use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use tonic::{Request, Response, Status};

use crate::otlp::decode::decode_request;
use crate::relay::Relay;

#[derive(Clone)]
pub struct GrpcIngest {
    relay: Relay,
}

impl GrpcIngest {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }

    pub fn traces_service(&self) -> TraceServiceServer<Self> {
        TraceServiceServer::new(self.clone())
    }
}

#[tonic::async_trait]
impl TraceService for GrpcIngest {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> std::result::Result<Response<ExportTraceServiceResponse>, Status> {
        let payload = decode_request(&request.into_inner());
        let outcome = self.relay.submit(&payload);
        tracing::debug!(
            retained = outcome.retained,
            delivered = outcome.delivered,
            "otlp grpc traces accepted"
        );
        Ok(Response::new(ExportTraceServiceResponse::default()))
    }
}
