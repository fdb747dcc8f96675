use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use tokio::net::TcpListener;

mod codec;
mod consts;
mod error;
mod handshake;
mod relay;

use handshake::{AuthStrategy, ServerConfig};

#[derive(Parser)]
#[command(name = "dyproxy")]
#[command(about = "SOCKS5 proxy server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:1080")]
    listen_addr: String,

    /// Username for username/password authentication
    #[arg(short, long, requires = "password")]
    username: Option<String>,

    /// Password for username/password authentication
    #[arg(short, long, requires = "username")]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // 凭据是只读配置，由每条连接各自查看，不存在跨连接的可变状态
    let auth = match (args.username, args.password) {
        (Some(username), Some(password)) => AuthStrategy::UsernamePassword { username, password },
        _ => AuthStrategy::NoAuth,
    };
    let config = Arc::new(ServerConfig { auth });

    let listener = TcpListener::bind(&args.listen_addr).await?;
    info!("SOCKS5 代理服务器启动在 {}", args.listen_addr);

    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                info!("新连接来自: {}", addr);
                let config = config.clone();
                tokio::spawn(async move {
                    // 单条连接的错误只记录日志，不影响其他连接
                    if let Err(e) = handshake::handle(socket, &config).await {
                        error!("处理连接时出错: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("接受连接时出错: {}", e);
            }
        }
    }
}
