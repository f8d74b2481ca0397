#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoExtentInfo {
    #[prost(uint64, tag = "1")]
    pub extent_id: u64,
    #[prost(uint64, tag = "2")]
    pub size: u64,
    #[prost(uint32, tag = "3")]
    pub crc: u32,
    #[prost(int64, tag = "4")]
    pub modify_time: i64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoGetExtentsInfoReq {
    #[prost(uint64, tag = "1")]
    pub partition_id: u64,
    #[prost(bool, tag = "2")]
    pub tiny: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoGetExtentsInfoResult {
    #[prost(message, repeated, tag = "1")]
    pub extents: ::prost::alloc::vec::Vec<ProtoExtentInfo>,
    #[prost(uint64, tag = "2")]
    pub tiny_delete_record_size: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoReadExtentReq {
    #[prost(uint64, tag = "1")]
    pub partition_id: u64,
    #[prost(uint64, tag = "2")]
    pub extent_id: u64,
    #[prost(uint64, tag = "3")]
    pub offset: u64,
    #[prost(uint64, tag = "4")]
    pub size: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoReadExtentResult {
    #[prost(bytes = "vec", tag = "1")]
    pub data: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub crc: u32,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRepairSource {
    #[prost(uint64, tag = "1")]
    pub extent_id: u64,
    #[prost(string, tag = "2")]
    pub addr: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoNotifyRepairReq {
    #[prost(uint64, tag = "1")]
    pub partition_id: u64,
    #[prost(message, repeated, tag = "2")]
    pub extents_to_be_created: ::prost::alloc::vec::Vec<ProtoExtentInfo>,
    #[prost(message, repeated, tag = "3")]
    pub extents_to_be_repaired: ::prost::alloc::vec::Vec<ProtoExtentInfo>,
    #[prost(message, repeated, tag = "4")]
    pub sources: ::prost::alloc::vec::Vec<ProtoRepairSource>,
    #[prost(string, tag = "5")]
    pub leader_addr: ::prost::alloc::string::String,
    #[prost(uint64, tag = "6")]
    pub leader_tiny_delete_record_file_size: u64,
}
/// Empty
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoNotifyRepairResult {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoReadTinyDeleteRecordsReq {
    #[prost(uint64, tag = "1")]
    pub partition_id: u64,
    #[prost(uint64, tag = "2")]
    pub offset: u64,
    #[prost(uint64, tag = "3")]
    pub max_size: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoReadTinyDeleteRecordsResult {
    #[prost(bytes = "vec", tag = "1")]
    pub data: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub crc: u32,
}
#[doc = r" Generated client implementations."]
pub mod grpc_data_node_repair_client {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = " DataNodeRepair is served by every storage node. Leaders use it to collect replica views and"]
    #[doc = " push repair tasks; followers use it to pull extent content and tiny-extent delete records."]
    pub struct GrpcDataNodeRepairClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl GrpcDataNodeRepairClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> GrpcDataNodeRepairClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + HttpBody + Send + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as HttpBody>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = tonic::client::Grpc::with_interceptor(inner, interceptor);
            Self { inner }
        }
        pub async fn get_extents_info(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoGetExtentsInfoReq>,
        ) -> Result<tonic::Response<super::ProtoGetExtentsInfoResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/repair.GrpcDataNodeRepair/GetExtentsInfo");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn read_extent(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoReadExtentReq>,
        ) -> Result<tonic::Response<super::ProtoReadExtentResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/repair.GrpcDataNodeRepair/ReadExtent");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn notify_repair(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoNotifyRepairReq>,
        ) -> Result<tonic::Response<super::ProtoNotifyRepairResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/repair.GrpcDataNodeRepair/NotifyRepair");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn read_tiny_delete_records(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoReadTinyDeleteRecordsReq>,
        ) -> Result<tonic::Response<super::ProtoReadTinyDeleteRecordsResult>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/repair.GrpcDataNodeRepair/ReadTinyDeleteRecords",
            );
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
    impl<T: Clone> Clone for GrpcDataNodeRepairClient<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }
    impl<T> std::fmt::Debug for GrpcDataNodeRepairClient<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "GrpcDataNodeRepairClient {{ ... }}")
        }
    }
}
#[doc = r" Generated server implementations."]
pub mod grpc_data_node_repair_server {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with GrpcDataNodeRepairServer."]
    #[async_trait]
    pub trait GrpcDataNodeRepair: Send + Sync + 'static {
        async fn get_extents_info(
            &self,
            request: tonic::Request<super::ProtoGetExtentsInfoReq>,
        ) -> Result<tonic::Response<super::ProtoGetExtentsInfoResult>, tonic::Status>;
        async fn read_extent(
            &self,
            request: tonic::Request<super::ProtoReadExtentReq>,
        ) -> Result<tonic::Response<super::ProtoReadExtentResult>, tonic::Status>;
        async fn notify_repair(
            &self,
            request: tonic::Request<super::ProtoNotifyRepairReq>,
        ) -> Result<tonic::Response<super::ProtoNotifyRepairResult>, tonic::Status>;
        async fn read_tiny_delete_records(
            &self,
            request: tonic::Request<super::ProtoReadTinyDeleteRecordsReq>,
        ) -> Result<tonic::Response<super::ProtoReadTinyDeleteRecordsResult>, tonic::Status>;
    }
    #[doc = " DataNodeRepair is served by every storage node. Leaders use it to collect replica views and"]
    #[doc = " push repair tasks; followers use it to pull extent content and tiny-extent delete records."]
    #[derive(Debug)]
    pub struct GrpcDataNodeRepairServer<T: GrpcDataNodeRepair> {
        inner: _Inner<T>,
    }
    struct _Inner<T>(Arc<T>, Option<tonic::Interceptor>);
    impl<T: GrpcDataNodeRepair> GrpcDataNodeRepairServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, None);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, Some(interceptor.into()));
            Self { inner }
        }
    }
    impl<T, B> Service<http::Request<B>> for GrpcDataNodeRepairServer<T>
    where
        T: GrpcDataNodeRepair,
        B: HttpBody + Send + Sync + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/repair.GrpcDataNodeRepair/GetExtentsInfo" => {
                    #[allow(non_camel_case_types)]
                    struct GetExtentsInfoSvc<T: GrpcDataNodeRepair>(pub Arc<T>);
                    impl<T: GrpcDataNodeRepair>
                        tonic::server::UnaryService<super::ProtoGetExtentsInfoReq>
                        for GetExtentsInfoSvc<T>
                    {
                        type Response = super::ProtoGetExtentsInfoResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoGetExtentsInfoReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).get_extents_info(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = GetExtentsInfoSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/repair.GrpcDataNodeRepair/ReadExtent" => {
                    #[allow(non_camel_case_types)]
                    struct ReadExtentSvc<T: GrpcDataNodeRepair>(pub Arc<T>);
                    impl<T: GrpcDataNodeRepair>
                        tonic::server::UnaryService<super::ProtoReadExtentReq>
                        for ReadExtentSvc<T>
                    {
                        type Response = super::ProtoReadExtentResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoReadExtentReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).read_extent(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = ReadExtentSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/repair.GrpcDataNodeRepair/NotifyRepair" => {
                    #[allow(non_camel_case_types)]
                    struct NotifyRepairSvc<T: GrpcDataNodeRepair>(pub Arc<T>);
                    impl<T: GrpcDataNodeRepair>
                        tonic::server::UnaryService<super::ProtoNotifyRepairReq>
                        for NotifyRepairSvc<T>
                    {
                        type Response = super::ProtoNotifyRepairResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoNotifyRepairReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).notify_repair(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = NotifyRepairSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/repair.GrpcDataNodeRepair/ReadTinyDeleteRecords" => {
                    #[allow(non_camel_case_types)]
                    struct ReadTinyDeleteRecordsSvc<T: GrpcDataNodeRepair>(pub Arc<T>);
                    impl<T: GrpcDataNodeRepair>
                        tonic::server::UnaryService<super::ProtoReadTinyDeleteRecordsReq>
                        for ReadTinyDeleteRecordsSvc<T>
                    {
                        type Response = super::ProtoReadTinyDeleteRecordsResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoReadTinyDeleteRecordsReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut =
                                async move { (*inner).read_tiny_delete_records(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = ReadTinyDeleteRecordsSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(tonic::body::BoxBody::empty())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: GrpcDataNodeRepair> Clone for GrpcDataNodeRepairServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self { inner }
        }
    }
    impl<T: GrpcDataNodeRepair> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone(), self.1.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: GrpcDataNodeRepair> tonic::transport::NamedService for GrpcDataNodeRepairServer<T> {
        const NAME: &'static str = "repair.GrpcDataNodeRepair";
    }
}
