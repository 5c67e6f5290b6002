//! Datasets and mini-batch iteration.

use crate::common::*;

/// An input image paired with its encoded ground truth.
#[derive(Debug)]
pub struct DataRecord {
    pub image: Tensor,
    /// The ground truth of shape `[S, S, 10 + C]`.
    pub target: Tensor,
}

/// The dataset that can be indexed in arbitrary order.
pub trait RandomAccessDataset {
    fn num_records(&self) -> usize;

    fn nth(&self, index: usize) -> Result<DataRecord>;
}

/// An in-memory dataset backed by stacked tensors.
#[derive(Debug)]
pub struct TensorDataset {
    images: Tensor,
    targets: Tensor,
}

impl TensorDataset {
    pub fn new(images: Tensor, targets: Tensor) -> Result<Self> {
        let num_images = images.size().first().cloned();
        let num_targets = targets.size().first().cloned();
        ensure!(
            num_images.is_some() && num_images == num_targets,
            "the number of images {:?} does not match the number of targets {:?}",
            num_images,
            num_targets
        );
        ensure!(
            targets.dim() == 4,
            "expect targets of shape [N, S, S, 10 + C], but get {:?}",
            targets.size()
        );
        Ok(Self { images, targets })
    }

    /// Load stacked image and ground truth tensors from files.
    pub fn open(images_file: impl AsRef<Path>, targets_file: impl AsRef<Path>) -> Result<Self> {
        let images_file = images_file.as_ref();
        let targets_file = targets_file.as_ref();
        let images = Tensor::load(images_file)
            .with_context(|| format!("failed to load '{}'", images_file.display()))?;
        let targets = Tensor::load(targets_file)
            .with_context(|| format!("failed to load '{}'", targets_file.display()))?;
        Self::new(images, targets)
    }
}

impl RandomAccessDataset for TensorDataset {
    fn num_records(&self) -> usize {
        self.images.size()[0] as usize
    }

    fn nth(&self, index: usize) -> Result<DataRecord> {
        let num_records = self.num_records();
        ensure!(
            index < num_records,
            "index {} is out of range, the dataset has {} records",
            index,
            num_records
        );
        Ok(DataRecord {
            image: self.images.get(index as i64),
            target: self.targets.get(index as i64),
        })
    }
}

/// Randomly split record indexes into training and validation parts.
///
/// The training part takes `floor(n * (1 - validation_ratio))` records.
pub fn random_split<R>(
    num_records: usize,
    validation_ratio: f64,
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>)
where
    R: Rng + ?Sized,
{
    let mut indexes: Vec<_> = (0..num_records).collect();
    indexes.shuffle(rng);
    let num_train = (num_records as f64 * (1.0 - validation_ratio)) as usize;
    let validation = indexes.split_off(num_train.min(num_records));
    (indexes, validation)
}

/// A mini-batch of stacked records.
#[derive(Debug)]
pub struct Batch {
    pub images: Tensor,
    pub targets: Tensor,
}

impl Batch {
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            images: self.images.to_device(device),
            targets: self.targets.to_device(device),
        }
    }
}

/// Group the records at `indexes` into mini-batches in order. The last batch
/// may be smaller.
pub fn batches<'a, D>(
    dataset: &'a D,
    indexes: &[usize],
    batch_size: usize,
) -> impl Iterator<Item = Result<Batch>> + 'a
where
    D: RandomAccessDataset + ?Sized,
{
    let chunks: Vec<Vec<usize>> = indexes
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect();

    chunks.into_iter().map(move |chunk| {
        let (images, targets): (Vec<_>, Vec<_>) = chunk
            .into_iter()
            .map(|index| {
                let DataRecord { image, target } = dataset.nth(index)?;
                Fallible::Ok((image, target))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();

        Ok(Batch {
            images: Tensor::stack(&images, 0),
            targets: Tensor::stack(&targets, 0),
        })
    })
}
