//! Extension protocol: plugging application objects into both directions.
//!
//! Every encoded array and map carries a leading object-type slot. Built-in
//! collections write nil there. An application object is resolved by
//! [`PackCtrl::from_obj`] into an [`Envelope`] whose tag fills the slot, and
//! on the way back a non-nil slot routes the decoded payload to
//! [`UnpackCtrl::from_dict`] or [`UnpackCtrl::from_list`].

use std::sync::Arc;

use crate::config::{DecoderOptions, EncoderOptions};
use crate::error::ExtensionError;
use crate::value::{Map, Object, Value};

/// How an application object is represented on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Encode as a map whose object-type slot holds `object_type`.
    Map { object_type: Value, entries: Map },
    /// Encode as an array whose object-type slot holds `object_type`.
    List { object_type: Value, items: Vec<Value> },
}

/// Encode-side controller: options plus the object hook.
pub trait PackCtrl: Send + Sync {
    /// Options for encoders built from this controller.
    fn options(&self) -> EncoderOptions {
        EncoderOptions::default()
    }

    /// Resolve an application object, or fail with
    /// [`ExtensionError::UnrecognizedObject`].
    fn from_obj(&self, object: &Object) -> Result<Envelope, ExtensionError>;
}

/// Decode-side controller: options plus the tagged-collection hooks.
pub trait UnpackCtrl: Send + Sync {
    /// Options for decoders built from this controller.
    fn options(&self) -> DecoderOptions {
        DecoderOptions::default()
    }

    /// Build an application value from a tagged map.
    fn from_dict(&self, object_type: Value, data: Map) -> Result<Value, ExtensionError>;

    /// Build an application value from a tagged array.
    fn from_list(&self, object_type: Value, data: Vec<Value>) -> Result<Value, ExtensionError>;
}

impl<T: PackCtrl + ?Sized> PackCtrl for Arc<T> {
    fn options(&self) -> EncoderOptions {
        (**self).options()
    }

    fn from_obj(&self, object: &Object) -> Result<Envelope, ExtensionError> {
        (**self).from_obj(object)
    }
}

impl<T: UnpackCtrl + ?Sized> UnpackCtrl for Arc<T> {
    fn options(&self) -> DecoderOptions {
        (**self).options()
    }

    fn from_dict(&self, object_type: Value, data: Map) -> Result<Value, ExtensionError> {
        (**self).from_dict(object_type, data)
    }

    fn from_list(&self, object_type: Value, data: Vec<Value>) -> Result<Value, ExtensionError> {
        (**self).from_list(object_type, data)
    }
}

/// Controller for plain data: carries options and recognizes no
/// application objects or tags.
#[derive(Debug, Clone, Default)]
pub struct Plain<O> {
    pub options: O,
}

impl<O> Plain<O> {
    pub fn new(options: O) -> Self {
        Self { options }
    }
}

impl PackCtrl for Plain<EncoderOptions> {
    fn options(&self) -> EncoderOptions {
        self.options
    }

    fn from_obj(&self, object: &Object) -> Result<Envelope, ExtensionError> {
        Err(ExtensionError::UnrecognizedObject(object.type_name()))
    }
}

impl UnpackCtrl for Plain<DecoderOptions> {
    fn options(&self) -> DecoderOptions {
        self.options.clone()
    }

    fn from_dict(&self, object_type: Value, _data: Map) -> Result<Value, ExtensionError> {
        Err(ExtensionError::UnrecognizedType(format!("{object_type:?}")))
    }

    fn from_list(&self, object_type: Value, _data: Vec<Value>) -> Result<Value, ExtensionError> {
        Err(ExtensionError::UnrecognizedType(format!("{object_type:?}")))
    }
}

/// Plain encode controller with default options.
pub fn plain_pack() -> Plain<EncoderOptions> {
    Plain::default()
}

/// Plain decode controller with default options.
pub fn plain_unpack() -> Plain<DecoderOptions> {
    Plain::default()
}
