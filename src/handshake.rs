use std::io;
use std::net::SocketAddr;

use log::{info, warn};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, lookup_host},
};

use crate::codec::{self, TargetAddr};
use crate::consts::*;
use crate::error::{ProxyError, Result};
use crate::relay;

/// 认证策略：默认无需认证，可按部署配置启用用户名/密码认证
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    NoAuth,
    UsernamePassword { username: String, password: String },
}

impl AuthStrategy {
    fn method(&self) -> u8 {
        match self {
            AuthStrategy::NoAuth => NO_AUTHENTICATION,
            AuthStrategy::UsernamePassword { .. } => USERNAME_PASSWORD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub auth: AuthStrategy,
}

/// 处理一条客户端连接的完整生命周期：协商认证方式、
/// 解析连接请求、建立出站连接、回应并开始双向转发。
/// 返回时两个套接字都已释放
pub async fn handle(mut client: TcpStream, config: &ServerConfig) -> Result<()> {
    // 一、客户端认证请求
    let greeting = codec::decode_greeting(&mut client).await?;
    let method = config.auth.method();
    if !greeting.offers(method) {
        // 客户端不支持要求的方式，直接断开，不发送任何回应
        warn!("客户端未提供认证方式 {:#04x}，断开连接", method);
        return Err(ProxyError::Protocol(format!(
            "客户端不支持认证方式: {:#04x}",
            method
        )));
    }

    // 二、服务端回应认证
    client
        .write_all(&codec::encode_method_selection(method))
        .await?;

    // 校验用户名和密码
    if let AuthStrategy::UsernamePassword { username, password } = &config.auth {
        verify_auth(&mut client, username, password).await?;
    }

    // 三、客户端连接请求
    let request = match codec::decode_connect_request(&mut client).await {
        Ok(request) => request,
        Err(e) => {
            // 握手已经完成，回复一个通用失败包再断开
            client
                .write_all(&codec::encode_connect_reply(
                    REPLY_GENERAL_FAILURE,
                    IPV4_ADDRESS,
                    None,
                ))
                .await?;
            return Err(e);
        }
    };

    // 只支持 CONNECT 请求
    if request.cmd != CONNECT_COMMAND {
        return Err(ProxyError::UnsupportedCommand(request.cmd));
    }

    // 四、连接目标并回应连接
    let upstream = match connect_upstream(&request.target).await {
        Ok(upstream) => upstream,
        Err(e) => {
            // 响应拒绝连接的错误，地址和端口置零，ATYP 沿用请求中的字节
            client
                .write_all(&codec::encode_connect_reply(
                    REPLY_GENERAL_FAILURE,
                    request.atyp,
                    None,
                ))
                .await?;
            return Err(e);
        }
    };

    info!("已建立连接: {}", request.target);
    let bound = upstream.local_addr().ok();
    client
        .write_all(&codec::encode_connect_reply(
            REPLY_SUCCESS,
            request.atyp,
            bound,
        ))
        .await?;

    // 建立连接成功，开始交换数据
    relay::relay(client, upstream).await
}

// RFC 1929 用户名/密码子协商
async fn verify_auth(client: &mut TcpStream, username: &str, password: &str) -> Result<()> {
    let (user, pass) = codec::decode_auth_request(client).await?;
    if user == username && pass == password {
        client
            .write_all(&codec::encode_auth_reply(AUTH_SUCCESS))
            .await?;
        return Ok(());
    }

    // 验证失败，回复后断开
    client
        .write_all(&codec::encode_auth_reply(AUTH_FAILURE))
        .await?;
    Err(ProxyError::Auth("用户名或密码错误".to_string()))
}

async fn connect_upstream(target: &TargetAddr) -> Result<TcpStream> {
    let addr = resolve(target).await?;
    TcpStream::connect(addr)
        .await
        .map_err(ProxyError::UpstreamConnect)
}

async fn resolve(target: &TargetAddr) -> Result<SocketAddr> {
    match target {
        TargetAddr::Ipv4(ip, port) => Ok(SocketAddr::from((*ip, *port))),
        TargetAddr::Domain(domain, port) => {
            let addrs: Vec<SocketAddr> = lookup_host(format!("{}:{}", domain, port))
                .await
                .map_err(ProxyError::UpstreamConnect)?
                .collect();
            // 优先取 IPv4 结果，回应包里的绑定地址才能如实编码
            addrs
                .iter()
                .find(|addr| addr.is_ipv4())
                .or_else(|| addrs.first())
                .copied()
                .ok_or_else(|| {
                    ProxyError::UpstreamConnect(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("无法解析域名: {}", domain),
                    ))
                })
        }
    }
}
