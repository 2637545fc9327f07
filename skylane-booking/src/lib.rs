pub mod inventory;
pub mod lifecycle;
pub mod mock;
pub mod paypal;
pub mod reconciler;
pub mod service;

pub use inventory::InventoryGuard;
pub use lifecycle::BookingLifecycle;
pub use reconciler::{PaymentReconciler, RedirectUrls, WebhookDisposition};
pub use service::{BookingService, ExecuteReceipt, PaymentSessionReceipt};
