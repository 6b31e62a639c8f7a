//! Network tunnel protocol parsers
//!
//! | Protocol | Module | Description |
//! |----------|--------|-------------|
//! | [GUE](gue) | `gue` | Generic UDP Encapsulation (draft-ietf-intarea-gue) - UDP port chosen by configuration |
//!
//! Tunnel decoders are bound in a
//! [`DecoderRegistry`](crate::packet::registry::DecoderRegistry) like any other
//! protocol. Their payload is dispatched again by its own protocol number, so
//! the inner packet decodes with the same parsers as the outer one.

pub mod gue;
