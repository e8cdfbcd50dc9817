//! Cross-product access guard
//!
//! Users of one product who reach another product's routes are redirected
//! to a cross-sell page rather than silently granted access. Entitlements
//! live as boolean properties on the identity provider.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};
use truetone_types::{coerce_flag, AuthenticatedUser, Entitlements, Product, UserId};

use crate::metrics::{self, Operation, OperationTimer};
use crate::{GateError, PropertyStore};

/// Checks and grants product entitlements
#[derive(Clone)]
pub struct ProductAccessGuard {
    properties: Arc<dyn PropertyStore>,
}

impl ProductAccessGuard {
    /// Create a guard over a property store
    pub fn new(properties: Arc<dyn PropertyStore>) -> Self {
        Self { properties }
    }

    /// Read every known product flag for a user
    pub async fn entitlements(&self, user_id: &UserId) -> Result<Entitlements, GateError> {
        let keys = Product::ALL.map(|product| product.property_key());
        let raw = self.properties.get_user_properties(user_id, &keys).await?;

        let mut entitlements = Entitlements::default();
        for product in Product::ALL {
            entitlements.set(product, raw.get(product.property_key()).is_some_and(coerce_flag));
        }
        Ok(entitlements)
    }

    /// Pass when the user holds `required` or holds no product at all (not
    /// yet onboarded). Otherwise signal a redirect naming the product the
    /// user does hold. Reads only.
    #[instrument(skip_all, fields(user_id = %user.id, required = %required))]
    pub async fn assert_product_access(
        &self,
        user: &AuthenticatedUser,
        required: Product,
    ) -> Result<(), GateError> {
        let timer = OperationTimer::start(Operation::ProductAccess);
        let result = self.check(user, required).await;
        timer.observe(&result);
        result
    }

    async fn check(&self, user: &AuthenticatedUser, required: Product) -> Result<(), GateError> {
        let entitlements = self.entitlements(&user.id).await?;

        if entitlements.has(required) {
            return Ok(());
        }

        match entitlements.other_than(required) {
            Some(source_product) => {
                info!(source = %source_product, "Cross-product access, redirecting");
                metrics::record_cross_product_redirect(source_product);
                Err(GateError::CrossProductAccess {
                    source_product,
                    email: user.email.clone(),
                })
            }
            None => {
                debug!("No product entitlements yet, allowing");
                Ok(())
            }
        }
    }

    /// Grant a product entitlement. Returns `true` when newly granted; an
    /// existing grant performs no write.
    #[instrument(skip(self), fields(user_id = %user_id, product = %product))]
    pub async fn grant(&self, user_id: &UserId, product: Product) -> Result<bool, GateError> {
        let key = product.property_key();
        let current = self.properties.get_user_property(user_id, key).await?;
        if current.as_ref().is_some_and(coerce_flag) {
            debug!("Entitlement already granted");
            return Ok(false);
        }

        let accepted = self
            .properties
            .set_user_property(user_id, key, Value::Bool(true))
            .await?;
        if !accepted {
            return Err(GateError::StoreUnavailable(format!(
                "identity provider rejected {key} update"
            )));
        }
        info!("Entitlement granted");
        Ok(true)
    }
}

impl std::fmt::Debug for ProductAccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductAccessGuard").finish_non_exhaustive()
    }
}
