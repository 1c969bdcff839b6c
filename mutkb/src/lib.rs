#[cfg(feature = "core")]
#[doc(inline)]
pub use mutkb_core as core;

#[cfg(feature = "core")]
pub use mutkb_core::encode_mutation;

#[cfg(feature = "lift")]
#[doc(inline)]
pub use mutkb_lift as lift;

#[cfg(feature = "join")]
#[doc(inline)]
pub use mutkb_join as join;

#[cfg(feature = "kb")]
#[doc(inline)]
pub use mutkb_kb as kb;

#[cfg(feature = "cooccur")]
#[doc(inline)]
pub use mutkb_cooccur as cooccur;

#[cfg(feature = "cooccur")]
pub use mutkb_cooccur::build_cooccurrence_matrix;
