use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProxyError>;

// 单条连接处理过程中的错误分类，全部在连接自己的任务内消化
#[derive(Error, Debug)]
pub enum ProxyError {
    /// 报文格式错误、版本不符、地址类型不支持或读取中途断开
    #[error("协议错误: {0}")]
    Protocol(String),

    /// 连接请求中出现 CONNECT 以外的命令
    #[error("不支持的命令: {0:#04x}")]
    UnsupportedCommand(u8),

    /// 用户名/密码校验失败
    #[error("认证失败: {0}")]
    Auth(String),

    /// 出站 TCP 连接失败（解析失败、拒绝连接、不可达）
    #[error("连接目标服务器失败: {0}")]
    UpstreamConnect(#[source] std::io::Error),

    /// 握手回应或转发阶段的套接字读写错误
    #[error("套接字读写出错: {0}")]
    Relay(#[from] std::io::Error),
}
