use log::info;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::consts::RELAY_BUFFER_SIZE;
use crate::error::Result;

/// 在客户端与目标之间双向转发数据
///
/// 任意一侧读到 0 字节（对端正常关闭）或读写出错即结束，
/// 两个套接字随本函数返回一起释放
pub async fn relay(mut client: TcpStream, mut upstream: TcpStream) -> Result<()> {
    let (mut client_read, mut client_write) = client.split();
    let (mut upstream_read, mut upstream_write) = upstream.split();

    let client_to_upstream = async {
        let mut buf = [0u8; RELAY_BUFFER_SIZE];
        loop {
            let n = match client_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => break,
            };
            if upstream_write.write_all(&buf[..n]).await.is_err() {
                break;
            }
        }
    };

    let upstream_to_client = async {
        let mut buf = [0u8; RELAY_BUFFER_SIZE];
        loop {
            let n = match upstream_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => break,
            };
            if client_write.write_all(&buf[..n]).await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => info!("客户端到目标的数据传输完成"),
        _ = upstream_to_client => info!("目标到客户端的数据传输完成"),
    }

    Ok(())
}
