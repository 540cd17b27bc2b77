// ABOUTME: Crate-internal macros for header-only PDUs and consuming builder setters
// ABOUTME: Header-only PDUs share one codec shape: a 16-byte header and nothing else

/// Encodable/Decodable for PDUs that are nothing but a header.
///
/// Takes `Type => CommandId` pairs. Each type must have exactly the fields
/// `command_status` and `sequence_number`.
macro_rules! header_only_codec {
    ($($pdu_type:ident => $command_id:expr),+ $(,)?) => {
        $(
            impl $crate::codec::Decodable for $pdu_type {
                fn command_ids() -> &'static [$crate::datatypes::CommandId] {
                    &[$command_id]
                }

                fn decode(
                    header: $crate::codec::PduHeader,
                    buf: &mut std::io::Cursor<&[u8]>,
                ) -> Result<Self, $crate::codec::CodecError> {
                    Self::validate_header(&header)?;
                    let body = bytes::Buf::remaining(buf);
                    if body != 0 {
                        return Err($crate::codec::CodecError::FieldValidation {
                            field: stringify!($pdu_type),
                            reason: format!("expected no body, found {} octets", body),
                        });
                    }
                    Ok(Self {
                        command_status: header.command_status,
                        sequence_number: header.sequence_number,
                    })
                }
            }

            impl $crate::codec::Encodable for $pdu_type {
                fn encode(
                    &self,
                    buf: &mut bytes::BytesMut,
                ) -> Result<(), $crate::codec::CodecError> {
                    let header = $crate::codec::PduHeader {
                        command_length: $crate::codec::PduHeader::SIZE as u32,
                        ..$crate::codec::PduHeader::new(
                            $command_id,
                            self.command_status,
                            self.sequence_number,
                        )
                    };
                    header.encode(buf)
                }

                fn encoded_size(&self) -> usize {
                    $crate::codec::PduHeader::SIZE
                }
            }
        )+
    };
}

/// [`header_only_codec`] plus `new(sequence_number)` with ESME_ROK and
/// `error(sequence_number, status)`.
macro_rules! header_only_pdu {
    ($($pdu_type:ident => $command_id:expr),+ $(,)?) => {
        $crate::macros::header_only_codec!($($pdu_type => $command_id),+);

        $(
            impl $pdu_type {
                pub fn new(sequence_number: u32) -> Self {
                    Self::error(sequence_number, $crate::datatypes::CommandStatus::OK)
                }

                pub fn error(
                    sequence_number: u32,
                    command_status: $crate::datatypes::CommandStatus,
                ) -> Self {
                    Self {
                        command_status,
                        sequence_number,
                    }
                }
            }
        )+
    };
}

/// Consuming setters: `field: Type` pairs become `fn field(self, Type) -> Self`
macro_rules! builder_setters {
    ($($field:ident: $type:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, $field: $type) -> Self {
                self.$field = $field;
                self
            }
        )*
    };
}

pub(crate) use {builder_setters, header_only_codec, header_only_pdu};
