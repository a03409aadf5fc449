use garden_admission_controller_core::Error;
use garden_admission_controller_k8s_api::{
    constants,
    garden::{cloud_profile::MachineType, shoot::Worker, CloudProfileSpec},
    Amount, Quantity, Shoot,
};
use std::{collections::BTreeMap, ops::AddAssign};

/// The resources a Shoot may consume, by quota metric.
///
/// Worker pools are charged at their maximum size.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Usage(BTreeMap<&'static str, Amount>);

impl Usage {
    pub fn of(shoot: &Shoot, profile: &CloudProfileSpec) -> Result<Self, Error> {
        let mut usage = Self::default();
        for (i, worker) in shoot.spec.provider.workers.iter().enumerate() {
            usage.add_worker(i, worker, profile)?;
        }
        if shoot.nginx_ingress_enabled() {
            usage.add(constants::METRIC_LOADBALANCER, Amount::from_units(1));
        }
        Ok(usage)
    }

    pub fn get(&self, metric: &str) -> Amount {
        self.0.get(metric).copied().unwrap_or(Amount::ZERO)
    }

    fn add(&mut self, metric: &'static str, amount: Amount) {
        *self.0.entry(metric).or_default() += amount;
    }

    fn add_worker(
        &mut self,
        index: usize,
        worker: &Worker,
        profile: &CloudProfileSpec,
    ) -> Result<(), Error> {
        let field = format!("spec.provider.workers[{index}]");
        let machine = profile.machine_type(&worker.machine.type_).ok_or_else(|| {
            Error::invalid_field(
                format!("{field}.machine.type"),
                format_args!(
                    "machine type {:?} is not offered by the cloud profile",
                    worker.machine.type_
                ),
            )
        })?;
        let count = i64::from(worker.maximum);

        self.add(constants::METRIC_CPU, profile_amount(&machine.cpu)? * count);
        self.add(constants::METRIC_GPU, profile_amount(&machine.gpu)? * count);
        self.add(constants::METRIC_MEMORY, profile_amount(&machine.memory)? * count);

        if let Some((class, size)) = storage(&field, worker, machine, profile)? {
            let metric = match class {
                constants::VOLUME_CLASS_STANDARD => constants::METRIC_STORAGE_STANDARD,
                constants::VOLUME_CLASS_PREMIUM => constants::METRIC_STORAGE_PREMIUM,
                class => {
                    return Err(Error::invalid_field(
                        format!("{field}.volume.type"),
                        format_args!("unknown volume class {class:?}"),
                    ))
                }
            };
            self.add(metric, size * count);
        }
        Ok(())
    }
}

impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, other: &Usage) {
        for (&metric, &amount) in &other.0 {
            self.add(metric, amount);
        }
    }
}

/// The storage class and size of a single machine of the worker pool.
///
/// An explicit volume is charged to its volume type's class. A volume type the profile does not
/// list falls back to the machine type's storage class. Without a volume, machines are charged
/// their fixed storage, if any.
fn storage<'p>(
    field: &str,
    worker: &Worker,
    machine: &'p MachineType,
    profile: &'p CloudProfileSpec,
) -> Result<Option<(&'p str, Amount)>, Error> {
    let Some(volume) = worker.volume.as_ref() else {
        return match machine.storage.as_ref() {
            Some(storage) => {
                let size = match storage.storage_size.as_ref() {
                    Some(size) => profile_amount(size)?,
                    None => Amount::ZERO,
                };
                Ok(Some((storage.class.as_str(), size)))
            }
            None => Ok(None),
        };
    };

    let class = volume
        .type_
        .as_deref()
        .and_then(|name| profile.volume_type(name))
        .map(|t| t.class.as_str())
        .or_else(|| machine.storage.as_ref().map(|s| s.class.as_str()))
        .ok_or_else(|| {
            Error::invalid_field(
                format!("{field}.volume.type"),
                format_args!(
                    "volume type {:?} is not offered by the cloud profile",
                    volume.type_.as_deref().unwrap_or_default()
                ),
            )
        })?;
    let size = volume.volume_size.amount().map_err(|error| {
        Error::invalid_field(format!("{field}.volume.size"), error)
    })?;
    Ok(Some((class, size)))
}

fn profile_amount(quantity: &Quantity) -> Result<Amount, Error> {
    if quantity.as_str().is_empty() {
        return Ok(Amount::ZERO);
    }
    quantity.amount().map_err(|error| {
        Error::internal(anyhow::anyhow!(
            "cloud profile has an invalid quantity {quantity:?}: {error}"
        ))
    })
}
