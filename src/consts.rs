// SOCKS5 协议常量
pub const SOCKS_VERSION: u8 = 0x05;
pub const NO_AUTHENTICATION: u8 = 0x00;
pub const USERNAME_PASSWORD: u8 = 0x02;
pub const NO_ACCEPTABLE_METHOD: u8 = 0xFF;
pub const CONNECT_COMMAND: u8 = 0x01;
pub const IPV4_ADDRESS: u8 = 0x01;
pub const DOMAIN_NAME: u8 = 0x03;
pub const IPV6_ADDRESS: u8 = 0x04;

// 协议状态码
pub const REPLY_SUCCESS: u8 = 0x00;
pub const REPLY_GENERAL_FAILURE: u8 = 0x05;

// 用户名/密码子协商 (RFC 1929)
pub const AUTH_VERSION: u8 = 0x01;
pub const AUTH_SUCCESS: u8 = 0x00;
pub const AUTH_FAILURE: u8 = 0xFF;

// 转发缓冲区大小
pub const RELAY_BUFFER_SIZE: usize = 4096;
