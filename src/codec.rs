use std::net::{Ipv4Addr, SocketAddr};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::consts::*;
use crate::error::{ProxyError, Result};

/// 连接请求中的目标地址：IPv4 直接使用，域名交给解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    Ipv4(Ipv4Addr, u16),
    Domain(String, u16),
}

impl std::fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetAddr::Ipv4(ip, port) => write!(f, "{}:{}", ip, port),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

#[derive(Debug)]
pub struct ClientGreeting {
    pub methods: Vec<u8>,
}

impl ClientGreeting {
    pub fn offers(&self, method: u8) -> bool {
        self.methods.contains(&method)
    }
}

#[derive(Debug)]
pub struct ConnectRequest {
    pub cmd: u8,
    /// 请求中的原始地址类型字节，失败回应需要原样带回
    pub atyp: u8,
    pub target: TargetAddr,
}

// 读不满就视为硬性解码失败，不做任何重试
async fn read_frame<R>(stream: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    stream
        .read_exact(buf)
        .await
        .map_err(|e| ProxyError::Protocol(format!("读取报文失败: {}", e)))?;
    Ok(())
}

/// 解码客户端认证请求: [VER, NMETHODS, METHODS...]
pub async fn decode_greeting<R>(stream: &mut R) -> Result<ClientGreeting>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    read_frame(stream, &mut header).await?;

    if header[0] != SOCKS_VERSION {
        return Err(ProxyError::Protocol(format!(
            "不支持的SOCKS版本: {}",
            header[0]
        )));
    }

    let mut methods = vec![0u8; header[1] as usize];
    read_frame(stream, &mut methods).await?;

    Ok(ClientGreeting { methods })
}

/// 解码客户端连接请求: [VER, CMD, RSV, ATYP, DST.ADDR, DST.PORT]
pub async fn decode_connect_request<R>(stream: &mut R) -> Result<ConnectRequest>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    read_frame(stream, &mut header).await?;

    if header[0] != SOCKS_VERSION {
        return Err(ProxyError::Protocol(format!(
            "不支持的SOCKS版本: {}",
            header[0]
        )));
    }

    let cmd = header[1];
    let atyp = header[3];

    let target = match atyp {
        IPV4_ADDRESS => {
            let mut addr = [0u8; 4];
            read_frame(stream, &mut addr).await?;
            let port = read_port(stream).await?;
            TargetAddr::Ipv4(Ipv4Addr::from(addr), port)
        }
        DOMAIN_NAME => {
            let mut len = [0u8; 1];
            read_frame(stream, &mut len).await?;
            if len[0] == 0 {
                return Err(ProxyError::Protocol("域名长度为0".to_string()));
            }
            let mut domain = vec![0u8; len[0] as usize];
            read_frame(stream, &mut domain).await?;
            let domain = String::from_utf8(domain)
                .map_err(|_| ProxyError::Protocol("域名不是合法的UTF-8".to_string()))?;
            let port = read_port(stream).await?;
            TargetAddr::Domain(domain, port)
        }
        // IPv6 目标地址不在支持范围内
        IPV6_ADDRESS => {
            return Err(ProxyError::Protocol("暂不支持IPv6地址".to_string()));
        }
        _ => {
            return Err(ProxyError::Protocol(format!(
                "不支持的地址类型: {}",
                atyp
            )));
        }
    };

    Ok(ConnectRequest { cmd, atyp, target })
}

/// 解码用户名/密码子协商请求: [VER, ULEN, UNAME, PLEN, PASSWD]
pub async fn decode_auth_request<R>(stream: &mut R) -> Result<(String, String)>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    read_frame(stream, &mut header).await?;

    if header[0] != AUTH_VERSION {
        return Err(ProxyError::Protocol(format!(
            "不支持的子协商版本: {}",
            header[0]
        )));
    }

    let mut username = vec![0u8; header[1] as usize];
    read_frame(stream, &mut username).await?;

    let mut plen = [0u8; 1];
    read_frame(stream, &mut plen).await?;
    let mut password = vec![0u8; plen[0] as usize];
    read_frame(stream, &mut password).await?;

    let username = String::from_utf8(username)
        .map_err(|_| ProxyError::Protocol("用户名不是合法的UTF-8".to_string()))?;
    let password = String::from_utf8(password)
        .map_err(|_| ProxyError::Protocol("密码不是合法的UTF-8".to_string()))?;

    Ok((username, password))
}

/// 服务端回应认证: [VER, METHOD]
pub fn encode_method_selection(method: u8) -> [u8; 2] {
    [SOCKS_VERSION, method]
}

/// 子协商回应: [VER, STATUS]
pub fn encode_auth_reply(status: u8) -> [u8; 2] {
    [AUTH_VERSION, status]
}

/// 服务端回应连接，固定 10 字节: [VER, REP, RSV, ATYP, BND.ADDR(4), BND.PORT(2)]
///
/// 失败路径或本地地址不是 IPv4 时，地址和端口全部置零
pub fn encode_connect_reply(status: u8, atyp: u8, bound: Option<SocketAddr>) -> Bytes {
    let mut buf = BytesMut::with_capacity(10);
    buf.put_u8(SOCKS_VERSION);
    buf.put_u8(status);
    buf.put_u8(0x00);
    buf.put_u8(atyp);
    match bound {
        Some(SocketAddr::V4(addr)) => {
            buf.put_slice(&addr.ip().octets());
            buf.put_u16(addr.port());
        }
        _ => {
            buf.put_slice(&[0u8; 4]);
            buf.put_u16(0);
        }
    }
    buf.freeze()
}

async fn read_port<R>(stream: &mut R) -> Result<u16>
where
    R: AsyncRead + Unpin,
{
    let mut port = [0u8; 2];
    read_frame(stream, &mut port).await?;
    Ok(u16::from_be_bytes(port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV4;

    #[tokio::test]
    async fn test_decode_greeting() {
        let mut input: &[u8] = &[5, 2, 0, 2];
        let greeting = decode_greeting(&mut input).await.unwrap();
        assert_eq!(greeting.methods, vec![0, 2]);
        assert!(greeting.offers(NO_AUTHENTICATION));
        assert!(!greeting.offers(NO_ACCEPTABLE_METHOD));
    }

    #[tokio::test]
    async fn test_decode_greeting_bad_version() {
        let mut input: &[u8] = &[4, 1, 0];
        let err = decode_greeting(&mut input).await.unwrap_err();
        assert!(matches!(err, ProxyError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_decode_greeting_short_read() {
        // 声明 3 个方法但只给 1 个字节
        let mut input: &[u8] = &[5, 3, 0];
        let err = decode_greeting(&mut input).await.unwrap_err();
        assert!(matches!(err, ProxyError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_decode_connect_request_ipv4() {
        let mut input: &[u8] = &[5, 1, 0, 1, 93, 184, 216, 34, 0, 80];
        let request = decode_connect_request(&mut input).await.unwrap();
        assert_eq!(request.cmd, CONNECT_COMMAND);
        assert_eq!(request.atyp, IPV4_ADDRESS);
        assert_eq!(
            request.target,
            TargetAddr::Ipv4(Ipv4Addr::new(93, 184, 216, 34), 80)
        );
    }

    #[tokio::test]
    async fn test_decode_connect_request_domain() {
        let mut input = Vec::from([5u8, 1, 0, 3, 11]);
        input.extend_from_slice(b"example.com");
        input.extend_from_slice(&8080u16.to_be_bytes());
        let mut input = input.as_slice();

        let request = decode_connect_request(&mut input).await.unwrap();
        assert_eq!(request.atyp, DOMAIN_NAME);
        assert_eq!(
            request.target,
            TargetAddr::Domain("example.com".to_string(), 8080)
        );
    }

    #[tokio::test]
    async fn test_decode_connect_request_empty_domain() {
        let mut input: &[u8] = &[5, 1, 0, 3, 0, 0, 80];
        let err = decode_connect_request(&mut input).await.unwrap_err();
        assert!(matches!(err, ProxyError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_decode_connect_request_ipv6_rejected() {
        let mut input = Vec::from([5u8, 1, 0, 4]);
        input.extend_from_slice(&[0u8; 16]);
        input.extend_from_slice(&443u16.to_be_bytes());
        let mut input = input.as_slice();

        let err = decode_connect_request(&mut input).await.unwrap_err();
        assert!(matches!(err, ProxyError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_decode_auth_request() {
        let mut input = Vec::from([1u8, 5]);
        input.extend_from_slice(b"admin");
        input.push(6);
        input.extend_from_slice(b"secret");
        let mut input = input.as_slice();

        let (username, password) = decode_auth_request(&mut input).await.unwrap();
        assert_eq!(username, "admin");
        assert_eq!(password, "secret");
    }

    #[test]
    fn test_encode_method_selection() {
        assert_eq!(encode_method_selection(NO_AUTHENTICATION), [5, 0]);
        assert_eq!(encode_method_selection(NO_ACCEPTABLE_METHOD), [5, 0xFF]);
    }

    #[test]
    fn test_failure_reply_layout() {
        // 失败回应固定为 [5, 5, 0, ATYP, 0, 0, 0, 0, 0, 0]
        let reply = encode_connect_reply(REPLY_GENERAL_FAILURE, DOMAIN_NAME, None);
        assert_eq!(&reply[..], &[5, 5, 0, 3, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reply_round_trip() {
        let bound = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 43210));
        let reply = encode_connect_reply(REPLY_SUCCESS, IPV4_ADDRESS, Some(bound));

        assert_eq!(reply.len(), 10);
        assert_eq!(reply[0], SOCKS_VERSION);
        assert_eq!(reply[1], REPLY_SUCCESS);
        assert_eq!(reply[3], IPV4_ADDRESS);

        let addr = Ipv4Addr::new(reply[4], reply[5], reply[6], reply[7]);
        let port = u16::from_be_bytes([reply[8], reply[9]]);
        assert_eq!(SocketAddr::V4(SocketAddrV4::new(addr, port)), bound);
    }
}
