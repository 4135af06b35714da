// Placement-level model view: objects, instances, and bed centering.
// Format decoding lives behind the `ModelLoader` collaborator.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl BoundingBox {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }

    fn merge(&mut self, other: BoundingBox) {
        self.min[0] = self.min[0].min(other.min[0]);
        self.min[1] = self.min[1].min(other.min[1]);
        self.max[0] = self.max[0].max(other.max[0]);
        self.max[1] = self.max[1].max(other.max[1]);
    }

    fn translated(&self, offset: [f64; 2]) -> BoundingBox {
        BoundingBox {
            min: [self.min[0] + offset[0], self.min[1] + offset[1]],
            max: [self.max[0] + offset[0], self.max[1] + offset[1]],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Instance {
    pub offset: [f64; 2],
}

#[derive(Clone, Debug)]
pub struct ModelObject {
    pub name: String,
    pub bounds: BoundingBox,
    pub instances: Vec<Instance>,
}

impl ModelObject {
    pub fn new(name: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            name: name.into(),
            bounds,
            instances: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Model {
    pub objects: Vec<ModelObject>,
}

impl Model {
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every object gets at least one placement instance at the origin.
    pub fn ensure_default_instances(&mut self) {
        for object in &mut self.objects {
            if object.instances.is_empty() {
                object.instances.push(Instance::default());
            }
        }
    }

    /// Union of all instance-translated object bounds. `None` while no
    /// object has an instance.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut combined: Option<BoundingBox> = None;
        for object in &self.objects {
            for instance in &object.instances {
                let bounds = object.bounds.translated(instance.offset);
                match &mut combined {
                    Some(total) => total.merge(bounds),
                    None => combined = Some(bounds),
                }
            }
        }
        combined
    }

    /// Shift every instance by the same delta so the combined bounding box
    /// is centered on `point`.
    pub fn center_instances_around(&mut self, point: [f64; 2]) {
        let Some(bounds) = self.bounding_box() else {
            return;
        };
        let current = bounds.center();
        let delta = [point[0] - current[0], point[1] - current[1]];
        for object in &mut self.objects {
            for instance in &mut object.instances {
                instance.offset[0] += delta[0];
                instance.offset[1] += delta[1];
            }
        }
    }
}
