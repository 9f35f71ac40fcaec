use crate::error::Result;
use crate::script::ReplyMember;
use crate::ww_error;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, trace, warn};
use zbus::message::Type as MessageType;
use zbus::{Connection, MessageStream};

use super::r#trait::ReplyChannel;

/// Приём вызова `callDBus(<unique name>, "/", "", member, value)` из скрипта KWin.
///
/// Поток сообщений создаётся в `open()`, то есть до загрузки скрипта,
/// поэтому ранний ответ не теряется.
pub struct KwinReplyChannel {
    address: String,
    stream: Option<MessageStream>,
}

impl KwinReplyChannel {
    pub fn open(connection: &Connection) -> Result<Self> {
        let address = connection
            .unique_name()
            .map(|name| name.to_string())
            .ok_or_else(|| ww_error!(unavailable, "соединение с шиной не получило уникальное имя"))?;

        debug!("Канал ответа открыт на {}", address);
        Ok(Self {
            address,
            stream: Some(MessageStream::from(connection)),
        })
    }
}

#[async_trait::async_trait]
impl ReplyChannel for KwinReplyChannel {
    fn address(&self) -> &str {
        &self.address
    }

    async fn await_reply(&mut self, member: ReplyMember, timeout: Duration) -> Result<Option<String>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ww_error!(internal, "канал ответа уже закрыт"))?;

        let wait = async {
            while let Some(message) = stream.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        debug!("Ошибка чтения сообщения с шины: {}", e);
                        continue;
                    }
                };

                if message.message_type() != MessageType::MethodCall {
                    continue;
                }

                let header = message.header();
                let name = header.member().map(|m| m.as_str().to_string());
                if name.as_deref() != Some(member.as_str()) {
                    trace!("Пропускаем постороннее сообщение: {:?}", name);
                    continue;
                }

                match message.body().deserialize::<String>() {
                    Ok(value) => return Some(value),
                    Err(e) => warn!("Ответ {} с неожиданным телом: {}", member, e),
                }
            }
            None
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(reply) => Ok(reply),
            Err(_) => {
                warn!("KWin не ответил ({}) за {} мс", member, timeout.as_millis());
                Ok(None)
            }
        }
    }

    async fn close(mut self: Box<Self>) {
        self.stream.take();
        debug!("Канал ответа {} закрыт", self.address);
    }
}
