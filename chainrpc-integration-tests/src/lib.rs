pub mod fixtures;
pub mod loopback;

pub use fixtures::{contract, factory, AppStub, CalcStub, Contract, ShapesStub};
pub use loopback::LoopbackSender;

use chainrpc_client::RpcClient;
use chainrpc_server::RpcServer;
use std::sync::Arc;

/// An `App` stub wired to an in-process server through a [`LoopbackSender`].
pub fn loopback_app(contract: &Contract) -> (AppStub, LoopbackSender, Arc<RpcServer>) {
    let server = Arc::new(RpcServer::new(
        Arc::clone(&contract.registry),
        contract.app,
        factory(contract),
    ));
    let sender = LoopbackSender::new(Arc::clone(&server));
    let proxy = RpcClient::new(Arc::clone(&contract.registry), sender.clone()).proxy(contract.app);
    (AppStub::new(proxy), sender, server)
}
