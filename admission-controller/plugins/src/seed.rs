use crate::WaitFor;
use garden_admission_controller_core::{
    Attributes, Error, Kind, Operation, Plugin, ReadyGate, Registration, Validate,
};
use garden_admission_controller_k8s_api::{ResourceExt, Seed, Shoot};
use garden_admission_controller_k8s_index::{Cache, Caches};

pub const NAME: &str = "SeedValidator";

/// Protects Seeds that host Shoots.
///
/// A Shoot counts as hosted by a Seed while either its desired or its current assignment names
/// the Seed, i.e. also while it migrates away from it.
pub struct SeedValidator {
    gate: ReadyGate,
    shoots: Cache<Shoot>,
}

impl SeedValidator {
    pub fn new(gate: ReadyGate, caches: &Caches) -> Self {
        Self {
            gate: gate.wait_for(&caches.shoots),
            shoots: caches.shoots.clone(),
        }
    }

    /// Names the Shoots assigned to the Seed, sorted.
    fn hosted_shoots(&self, seed: &str) -> Vec<String> {
        let mut shoots = self
            .shoots
            .list()
            .into_iter()
            .filter(|shoot| shoot.is_assigned_to(seed))
            .map(|shoot| {
                format!(
                    "{}/{}",
                    shoot.namespace().unwrap_or_default(),
                    shoot.name_any()
                )
            })
            .collect::<Vec<_>>();
        shoots.sort();
        shoots
    }

    fn validate_update(&self, attrs: &Attributes) -> Result<(), Error> {
        let seed = attrs.object::<Seed>()?;
        let old = attrs.require_old_object::<Seed>()?;

        let zones = seed.zones();
        let removed = old
            .zones()
            .into_iter()
            .filter(|zone| !zones.contains(zone))
            .collect::<Vec<_>>();
        if removed.is_empty() {
            return Ok(());
        }

        let hosted = self.hosted_shoots(&seed.name_any());
        if !hosted.is_empty() {
            return Err(Error::forbidden_field(
                "spec.provider.zones",
                format_args!(
                    "zones [{}] cannot be removed while shoots are scheduled to the seed: {}",
                    removed.join(", "),
                    hosted.join(", ")
                ),
            ));
        }
        Ok(())
    }

    fn validate_delete(&self, attrs: &Attributes) -> Result<(), Error> {
        let hosted = self.hosted_shoots(&attrs.name);
        if !hosted.is_empty() {
            return Err(Error::forbidden(format_args!(
                "seed {} cannot be deleted while it is still used by shoots: {}",
                attrs.name,
                hosted.join(", ")
            )));
        }
        Ok(())
    }
}

impl Plugin for SeedValidator {
    fn registration(&self) -> Registration {
        Registration::new(NAME, &[Kind::Seed], &[Operation::Update, Operation::Delete])
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Validate for SeedValidator {
    async fn validate(&self, attrs: &Attributes) -> Result<(), Error> {
        match attrs.operation {
            Operation::Update => self.validate_update(attrs),
            Operation::Delete => self.validate_delete(attrs),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use garden_admission_controller_k8s_api::garden::ShootStatus;

    fn validator(shoots: Vec<Shoot>) -> SeedValidator {
        let caches = Caches {
            shoots: Cache::synced_with(shoots),
            ..Default::default()
        };
        SeedValidator::new(ReadyGate::default(), &caches)
    }

    fn scheduled(name: &str, seed: &str) -> Shoot {
        let mut shoot = mk_shoot("garden-dev", name);
        shoot.spec.seed_name = Some(seed.into());
        shoot
    }

    fn migrating(name: &str, from: &str, to: &str) -> Shoot {
        let mut shoot = scheduled(name, to);
        shoot.status = Some(ShootStatus {
            seed_name: Some(from.into()),
            ..Default::default()
        });
        shoot
    }

    async fn shrink(validator: &SeedValidator) -> Result<(), Error> {
        let old = mk_seed("aws", &["a", "b", "c"]);
        let new = mk_seed("aws", &["a", "b"]);
        let attrs = Attributes::new(Operation::Update, new, mk_user("admin")).with_old_object(old);
        validator.validate(&attrs).await
    }

    #[tokio::test]
    async fn zones_of_used_seeds_cannot_shrink() {
        let err = shrink(&validator(vec![scheduled("a", "aws")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(err.to_string().contains("[c]"), "{err}");
        assert!(err.to_string().contains("garden-dev/a"), "{err}");

        assert!(shrink(&validator(vec![])).await.is_ok());
        assert!(shrink(&validator(vec![scheduled("a", "gcp")])).await.is_ok());
    }

    #[tokio::test]
    async fn migrating_shoots_count_as_hosted() {
        let err = shrink(&validator(vec![migrating("a", "aws", "gcp")])).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn zones_may_grow() {
        let validator = validator(vec![scheduled("a", "aws")]);
        let old = mk_seed("aws", &["a"]);
        let new = mk_seed("aws", &["a", "b"]);
        let attrs = Attributes::new(Operation::Update, new, mk_user("admin")).with_old_object(old);
        assert!(validator.validate(&attrs).await.is_ok());
    }

    #[tokio::test]
    async fn used_seeds_cannot_be_deleted() {
        let attrs = Attributes::delete(mk_seed("aws", &[]), mk_user("admin"));
        let err = validator(vec![migrating("a", "aws", "gcp")])
            .validate(&attrs)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        assert!(validator(vec![scheduled("a", "gcp")])
            .validate(&attrs)
            .await
            .is_ok());
    }
}
