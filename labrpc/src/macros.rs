#[macro_export]
macro_rules! service {
    () => {
        compile_error!("empty service is not allowed");
    };
    (
        $(#[$service_attr:meta])*
        service $svc_name:ident {
            $(
                $(#[$method_attr:meta])*
                fn $method_name:ident($($arg_id:ident: $arg_ty:ty),*) -> $output:ty;
            )*
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$service_attr])*
        pub mod $svc_name {
            use super::*;

            use std::sync::Arc;
            use std::time::Duration;

            use $crate::network::NetworkPackage;
            use $crate::{client, server, Reply, RpcError};

            use $crate::tokio::sync::mpsc::{self, Sender, Receiver};
            use $crate::serde_json;
            use $crate::serde::{Serialize, Deserialize};
            use $crate::anyhow::{Result, anyhow};
            use $crate::async_trait;
            use $crate::log::{trace, warn};


            #[derive(Debug, Deserialize, Serialize)]
            pub enum Request {
                $(
                    #[allow(non_camel_case_types)]
                    $method_name {  $($arg_id : $arg_ty),* }
                ),*
            }

            #[async_trait]
            pub trait Service: Send + Sync + 'static {
                $(
                    $(#[$method_attr])*
                    async fn $method_name(&self, $($arg_id : $arg_ty),* ) -> Result<$output>;
                )*
            }

            #[async_trait]
            impl<T: Service> Service for Arc<T> {
                $(
                    async fn $method_name(&self, $($arg_id : $arg_ty),* ) -> Result<$output> {
                        <T as Service>::$method_name(&**self, $($arg_id),*).await
                    }
                )*
            }

            #[derive(Debug, Clone)]
            pub struct Client {
                server_id: String,
                tx: Sender<NetworkPackage>,
                timeout: Duration,
            }

            impl Client {
                /// Bound every call made through this client by `timeout`.
                pub fn with_timeout(mut self, timeout: Duration) -> Self {
                    self.timeout = timeout;
                    self
                }

                $(
                    pub async fn $method_name(&self, $($arg_id : $arg_ty),* ) -> Result<$output> {
                        let req = Request::$method_name {
                            $($arg_id),*
                        };
                        let resp = self.call(serde_json::to_string(&req)?).await?;
                        let resp: Reply<$output> = serde_json::from_str(&resp)?;
                        Ok(resp.into_result()?)
                    }
                )*

                pub async fn call(&self, req: String) -> Result<String> {
                    Ok(client::call(&self.tx, &self.server_id, req, self.timeout).await?)
                }
            }

            impl client::Client for Client {
                fn from_server(server_id: String, net_tx: Sender<NetworkPackage>) -> Self {
                    Self {
                        server_id,
                        tx: net_tx,
                        timeout: client::DEFAULT_TIMEOUT,
                    }
                }

                fn server_id(&self) -> &str {
                    &self.server_id
                }
            }

            pub struct Server<T: Service> {
                svc: Arc<T>,
                tx: Sender<NetworkPackage>,
                rx: Receiver<NetworkPackage>,
            }

            impl<T: Service> Server<T> {
                async fn dispatch(svc: Arc<T>, data: String) -> Option<String> {
                    let req: Request = match serde_json::from_str(&data) {
                        Ok(req) => req,
                        Err(e) => {
                            warn!("undecodable request {}: {}", &data, e);
                            let reply = Reply::<()>::Err(RpcError::InvalidRequest(e.to_string()));
                            return serde_json::to_string(&reply).ok();
                        }
                    };
                    match req {
                        $(
                            Request::$method_name { $($arg_id),* } => {
                                let reply = match <T as Service>::$method_name(&*svc, $($arg_id),* ).await {
                                    Ok(data) => Reply::Ok(data),
                                    Err(e) => $crate::error::reply_for_error(e)?,
                                };
                                serde_json::to_string(&reply).ok()
                            }
                        )*
                    }
                }
            }

            #[async_trait]
            impl<T: Service> server::Server for Server<T> {
                type Service = T;

                fn from_service(svc: Self::Service) -> Self {
                    let (tx, rx) = mpsc::channel(100);
                    Self {svc: Arc::new(svc), tx, rx}
                }

                fn client_chan(&self) -> Sender<NetworkPackage> {
                    self.tx.clone()
                }

                async fn handle(&mut self) -> Result<()> {
                    let NetworkPackage{to, reply, data} = self
                        .rx
                        .recv()
                        .await
                        .ok_or_else(|| anyhow!("expected sender"))?;
                    trace!("{} handle recv: {}", &to, &data);
                    let svc = self.svc.clone();
                    $crate::tokio::spawn(async move {
                        match Server::<T>::dispatch(svc, data).await {
                            Some(resp) => {
                                trace!("{} handle send: {}", &to, &resp);
                                // The caller may have timed out already.
                                let _ = reply.send(resp);
                            }
                            None => trace!("{} sent no reply", &to),
                        }
                    });
                    Ok(())
                }
            }
        }
    };
}
