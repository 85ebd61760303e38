use std::fmt;

// 句柄连接状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected { reason: DisconnectReason },
}

impl ConnectionState {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected { .. })
    }
}

// 断开原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// 调用方主动解绑
    Unbound,
    /// 工厂关闭
    Shutdown,
    /// 建立连接失败
    ConnectFailed(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Unbound => write!(f, "unbound"),
            DisconnectReason::Shutdown => write!(f, "factory shutdown"),
            DisconnectReason::ConnectFailed(err) => write!(f, "connect failed: {err}"),
        }
    }
}
