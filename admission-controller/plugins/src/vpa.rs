use garden_admission_controller_core::{
    Attributes, Error, Kind, Mutate, Operation, Plugin, ReadyGate, Registration,
};
use garden_admission_controller_k8s_api::{garden::shoot::VerticalPodAutoscaler, Shoot};

pub const NAME: &str = "ShootVPAEnabledByDefault";

/// Enables the vertical pod autoscaler of new Shoots with workers unless they configure it.
pub struct VpaEnabledByDefault {
    gate: ReadyGate,
}

impl VpaEnabledByDefault {
    pub fn new(gate: ReadyGate) -> Self {
        Self { gate }
    }
}

impl Plugin for VpaEnabledByDefault {
    fn registration(&self) -> Registration {
        Registration::new(NAME, &[Kind::Shoot], &[Operation::Create])
    }

    fn ready_gate(&self) -> &ReadyGate {
        &self.gate
    }
}

#[async_trait::async_trait]
impl Mutate for VpaEnabledByDefault {
    async fn admit(&self, attrs: &mut Attributes) -> Result<(), Error> {
        let shoot = attrs.object_mut::<Shoot>()?;
        if shoot.is_workerless() || shoot.spec.kubernetes.vertical_pod_autoscaler.is_some() {
            return Ok(());
        }
        shoot.spec.kubernetes.vertical_pod_autoscaler =
            Some(VerticalPodAutoscaler { enabled: true });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    async fn admit(shoot: Shoot) -> Option<VerticalPodAutoscaler> {
        let mut attrs = Attributes::new(Operation::Create, shoot, mk_user("alice"));
        VpaEnabledByDefault::new(ReadyGate::default())
            .admit(&mut attrs)
            .await
            .expect("must admit");
        attrs
            .object::<Shoot>()
            .unwrap()
            .spec
            .kubernetes
            .vertical_pod_autoscaler
            .clone()
    }

    #[tokio::test]
    async fn enables_when_unset() {
        let vpa = admit(mk_shoot("garden-dev", "a")).await;
        assert_eq!(vpa, Some(VerticalPodAutoscaler { enabled: true }));
    }

    #[tokio::test]
    async fn keeps_explicit_setting() {
        let mut shoot = mk_shoot("garden-dev", "a");
        shoot.spec.kubernetes.vertical_pod_autoscaler =
            Some(VerticalPodAutoscaler { enabled: false });
        let vpa = admit(shoot).await;
        assert_eq!(vpa, Some(VerticalPodAutoscaler { enabled: false }));
    }

    #[tokio::test]
    async fn ignores_workerless_shoots() {
        let mut shoot = mk_shoot("garden-dev", "a");
        shoot.spec.provider.workers.clear();
        assert_eq!(admit(shoot).await, None);
    }
}
