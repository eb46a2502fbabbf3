//! # header 模块说明
//!
//! ## 角色定位（Why）
//! - 请求关联头是相关器在消息上随附的唯一线上状态：请求编号、消息类别、
//!   是否期待应答、相关器编号。应答方原样回填请求编号，发起方据此把响应
//!   归到未决表中的收集器；
//! - 具体承载格式由通道选择，本模块提供一份逐位确定的参考编码，保证同一
//!   集群内所有成员 round-trip 后比特一致。
//!
//! ## 设计要求（What）
//! - 定长 12 字节、大端序：`request_id:u64 | kind:u8 | rsp_expected:u8 | corr_id:u16`；
//! - 解码对字节不足与类别越界返回 [`codes::PROTOCOL_DECODE`]，绝不 panic。

use bytes::{Buf, BufMut};

use crate::error::{CoreError, codes};

/// 关联头的消息类别。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// 请求消息，期待（或不期待）应答。
    Req,
    /// 正常应答，负载为处理器返回值。
    Rsp,
    /// 异常应答，负载为远端失败描述。
    ExceptionRsp,
}

impl HeaderKind {
    fn to_wire(self) -> u8 {
        match self {
            Self::Req => 0,
            Self::Rsp => 1,
            Self::ExceptionRsp => 2,
        }
    }

    fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Req),
            1 => Some(Self::Rsp),
            2 => Some(Self::ExceptionRsp),
            _ => None,
        }
    }
}

/// 随每条请求/应答消息传播的关联头。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestHeader {
    /// 相关器分配的单调请求编号。
    pub request_id: u64,
    /// 消息类别。
    pub kind: HeaderKind,
    /// 发起方是否期待应答；`GET_NONE` 请求置为 `false`。
    pub rsp_expected: bool,
    /// 相关器编号，隔离同一通道上的多个相关器实例。
    pub corr_id: u16,
}

impl RequestHeader {
    /// 参考编码的定长字节数。
    pub const ENCODED_LEN: usize = 12;

    /// 构造请求头。
    pub fn request(request_id: u64, rsp_expected: bool, corr_id: u16) -> Self {
        Self {
            request_id,
            kind: HeaderKind::Req,
            rsp_expected,
            corr_id,
        }
    }

    /// 构造正常应答头，请求编号原样回填。
    pub fn response(request_id: u64, corr_id: u16) -> Self {
        Self {
            request_id,
            kind: HeaderKind::Rsp,
            rsp_expected: false,
            corr_id,
        }
    }

    /// 构造异常应答头。
    pub fn exception(request_id: u64, corr_id: u16) -> Self {
        Self {
            request_id,
            kind: HeaderKind::ExceptionRsp,
            rsp_expected: false,
            corr_id,
        }
    }

    /// 是否为应答类消息（含异常应答）。
    pub fn is_response(&self) -> bool {
        matches!(self.kind, HeaderKind::Rsp | HeaderKind::ExceptionRsp)
    }

    /// 按参考格式写出 12 字节编码。
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.request_id);
        buf.put_u8(self.kind.to_wire());
        buf.put_u8(u8::from(self.rsp_expected));
        buf.put_u16(self.corr_id);
    }

    /// 从字节流解析关联头。
    ///
    /// - **前置条件**：`buf` 剩余字节 >= [`ENCODED_LEN`](Self::ENCODED_LEN)，否则返回解码错误；
    /// - **后置条件**：成功时恰好消费 12 字节。
    pub fn decode(buf: &mut impl Buf) -> Result<Self, CoreError> {
        if buf.remaining() < Self::ENCODED_LEN {
            return Err(CoreError::new(
                codes::PROTOCOL_DECODE,
                "request header truncated",
            ));
        }
        let request_id = buf.get_u64();
        let raw_kind = buf.get_u8();
        let kind = HeaderKind::from_wire(raw_kind).ok_or_else(|| {
            CoreError::new(
                codes::PROTOCOL_DECODE,
                format!("unknown header kind {raw_kind}"),
            )
        })?;
        let rsp_expected = buf.get_u8() != 0;
        let corr_id = buf.get_u16();
        Ok(Self {
            request_id,
            kind,
            rsp_expected,
            corr_id,
        })
    }
}
